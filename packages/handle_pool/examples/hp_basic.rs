//! Basic usage of `StoragePool`: allocate handles, store items, free them with cleanup and
//! observe stale-handle detection.

use handle_pool::{Error, StoragePool, diagnostics};

/// Callers hold `Handle<Texture>`; the pixel storage type stays private to the pool.
struct Texture;

#[derive(Clone, Debug, Default)]
struct TextureData {
    name: String,
    pixels: Vec<u8>,
}

fn main() {
    println!("=== Handle Pool Basic Example ===");

    let mut textures = StoragePool::<TextureData, Texture>::new();

    let grass = textures.allocate().expect("fresh pool cannot be exhausted");
    textures.insert(
        grass,
        TextureData {
            name: "grass".to_string(),
            pixels: vec![0x22; 64],
        },
    );

    let stone = textures.allocate().expect("fresh pool cannot be exhausted");
    textures.insert(
        stone,
        TextureData {
            name: "stone".to_string(),
            pixels: vec![0x88; 64],
        },
    );

    println!("Stored {} textures in {} slots", textures.len(), textures.slot_count());
    println!("Grass handle: {grass:?}");

    // Release the pixel buffer when the texture is freed.
    textures
        .free_with(grass, |texture| {
            println!("Releasing {} ({} bytes)", texture.name, texture.pixels.len());
            texture.pixels = Vec::new();
        })
        .expect("grass handle is live");

    println!("Grass handle still valid? {}", textures.is_valid(grass));

    // The freed slot is reused with a new generation.
    let water = textures.allocate().expect("a freed slot is available");
    textures.insert(
        water,
        TextureData {
            name: "water".to_string(),
            pixels: vec![0x11; 64],
        },
    );
    println!("Water handle: {water:?}");

    match textures.free(grass) {
        Err(Error::DoubleFree { index, generation }) => {
            println!("Caught double free of index {index} generation {generation}");
        }
        other => println!("Unexpected result: {other:?}"),
    }

    for (handle, texture) in textures.iter() {
        println!("Live texture at index {}: {}", handle.index(), texture.name);
    }

    println!("{}", textures.stats());
    diagnostics::report(textures.allocator());

    println!("Example completed successfully!");
}
