//! Golden digest test for the raster compositor
//!
//! The composited output for a fixed request must never drift byte-for-byte.
//! Run with UPDATE_GOLDENS=1 to refresh the stored digest after an
//! intentional rendering change.

use std::fs;
use std::path::PathBuf;

use image::{Rgba, RgbaImage};
use qrforge::{dataurl, LogoShape, LogoSpec, QrcodeProvider, RenderRequest};
use sha2::{Digest, Sha256};

fn golden_path() -> PathBuf {
    PathBuf::from("tests/goldens/composite.digest")
}

#[tokio::test]
async fn golden_composite_matches_fixture() -> anyhow::Result<()> {
    let provider = QrcodeProvider::new();
    let request = RenderRequest::new("https://example.com/golden", 200)
        .with_colors("#102030", "#f8f8f8");
    let logo_img = RgbaImage::from_fn(24, 24, |x, y| {
        if (x + y) % 2 == 0 {
            Rgba([200, 40, 40, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    });
    let logo = LogoSpec::raster(dataurl::encode_png_url(&logo_img)?)
        .with_shape(LogoShape::RoundedSquare)
        .with_size_fraction(0.22)
        .with_background("#ffffff");

    let out = qrforge::render_raster(&provider, &request, Some(&logo)).await?;
    let digest = hex::encode(Sha256::digest(out.artifact.payload.as_bytes()));

    let expected_path = golden_path();
    if std::env::var("UPDATE_GOLDENS").is_ok() {
        fs::create_dir_all("tests/goldens")?;
        fs::write(&expected_path, &digest)?;
        println!("Updated golden: {expected_path:?}");
        return Ok(());
    }

    if !expected_path.exists() {
        println!("No golden at {expected_path:?}; run with UPDATE_GOLDENS=1 to create it. Skipping.");
        return Ok(());
    }

    let expected = fs::read_to_string(&expected_path)?;
    assert_eq!(digest, expected.trim());
    Ok(())
}
