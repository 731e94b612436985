use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{error, info, warn};
use nxg_lib::{nxgt::Nxgt, standalone, surface::RasterFrame, txtr::Txtr};
use rayon::prelude::*;

pub fn print_info(input: &str) -> anyhow::Result<()> {
    match Path::new(input).extension().and_then(|e| e.to_str()) {
        Some("nxg_textures") => {
            let nxgt = Nxgt::from_file(input)?;
            println!("{} entries", nxgt.entries().len());
            for (i, entry) in nxgt.entries().iter().enumerate() {
                let name = entry.name.as_deref().unwrap_or("<unnamed>");
                println!("{i}: {name} ({} bytes)", entry.size);
            }
        }
        _ => {
            let txtr = Txtr::from_file(input)?;
            println!(
                "{}x{} {:?} with {} mipmaps",
                txtr.width, txtr.height, txtr.image_format, txtr.mipmap_count
            );
        }
    }
    Ok(())
}

pub fn decode_to_png(input: &str, output: Option<&str>, mipmap: Option<u32>) -> anyhow::Result<()> {
    let input_path = Path::new(input);
    let output = output
        .map(PathBuf::from)
        .unwrap_or_else(|| input_path.with_extension("png"));

    let frame = decode_frame(input_path, mipmap.unwrap_or(0))?;
    save_png(&frame, &output)?;

    info!("saved {:?}", output);
    Ok(())
}

fn decode_frame(input: &Path, mipmap: u32) -> anyhow::Result<RasterFrame> {
    match input.extension().and_then(|e| e.to_str()) {
        Some("txtr") => {
            let txtr = Txtr::from_file(input)?;
            Ok(txtr.mipmap(mipmap)?)
        }
        Some("nxg_textures") => {
            anyhow::bail!("archives contain multiple textures, use the extract command instead")
        }
        // Assume other formats are single frame images.
        _ => Ok(standalone::decode_file(input)?),
    }
}

pub fn encode_to_txtr(input: &str, output: Option<&str>) -> anyhow::Result<()> {
    let input_path = Path::new(input);
    let output = output
        .map(PathBuf::from)
        .unwrap_or_else(|| input_path.with_extension("txtr"));

    let frame = standalone::decode_file(input_path)?;
    let txtr = Txtr::from_frame(&frame)?;
    txtr.write_to_file(&output)?;

    info!("saved {:?}", output);
    Ok(())
}

pub fn extract_archive(input: &str, output_folder: Option<&str>, raw: bool) -> anyhow::Result<()> {
    let input_path = Path::new(input);
    let output_folder = output_folder.map(PathBuf::from).unwrap_or_else(|| {
        input_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default()
    });
    std::fs::create_dir_all(&output_folder)?;

    let nxgt = Nxgt::from_file(input_path)
        .with_context(|| format!("failed to read archive {input:?}"))?;

    // One corrupt entry should not prevent extracting the others.
    let count = if raw {
        nxgt.entries()
            .par_iter()
            .enumerate()
            .filter(|(i, entry)| {
                save_entry_raw(&output_folder, input_path, *i, entry.name.as_deref(), &nxgt)
            })
            .count()
    } else {
        nxgt.entries()
            .par_iter()
            .zip(nxgt.decode_textures())
            .enumerate()
            .filter(|(i, (entry, texture))| match texture {
                Ok(txtr) => save_entry(&output_folder, input_path, *i, entry.name.as_deref(), txtr),
                Err(e) => {
                    warn!("skipping corrupt entry {i}: {e}");
                    false
                }
            })
            .count()
    };

    info!("extracted {count} of {} entries", nxgt.entries().len());
    Ok(())
}

fn save_entry(
    output_folder: &Path,
    input: &Path,
    index: usize,
    name: Option<&str>,
    txtr: &Txtr,
) -> bool {
    let output = output_folder
        .join(entry_output_name(input, index, name))
        .with_extension("png");

    let result = txtr
        .mipmap(0)
        .map_err(anyhow::Error::from)
        .and_then(|frame| save_png(&frame, &output));
    match result {
        Ok(_) => true,
        Err(e) => {
            error!("error saving entry {index} to {output:?}: {e}");
            false
        }
    }
}

fn save_entry_raw(
    output_folder: &Path,
    input: &Path,
    index: usize,
    name: Option<&str>,
    nxgt: &Nxgt,
) -> bool {
    let output = output_folder
        .join(entry_output_name(input, index, name))
        .with_extension("txtr");

    let result = nxgt
        .extract(index)
        .map_err(anyhow::Error::from)
        .and_then(|blob| Ok(std::fs::write(&output, blob)?));
    match result {
        Ok(_) => true,
        Err(e) => {
            error!("error saving entry {index} to {output:?}: {e}");
            false
        }
    }
}

pub fn batch_decode(root: &str, pattern: &str) -> anyhow::Result<()> {
    let paths: Vec<_> = globwalk::GlobWalkerBuilder::from_patterns(root, &[pattern])
        .build()?
        .filter_map(|e| e.map(|e| e.path().to_owned()).ok())
        .collect();

    // Decoding doesn't share any state, so fan out across all textures.
    let count = paths
        .par_iter()
        .filter(|path| {
            let result = decode_frame(path, 0)
                .and_then(|frame| save_png(&frame, &path.with_extension("png")));
            match result {
                Ok(_) => true,
                Err(e) => {
                    error!("error converting {path:?}: {e}");
                    false
                }
            }
        })
        .count();

    info!("converted {count} of {} files", paths.len());
    Ok(())
}

fn save_png(frame: &RasterFrame, output: &Path) -> anyhow::Result<()> {
    let png = standalone::encode_png(frame)?;
    std::fs::write(output, png)?;
    Ok(())
}

fn entry_output_name(input: &Path, index: usize, name: Option<&str>) -> String {
    name.map(entry_file_name)
        .unwrap_or_else(|| format!("{}.{index}", file_stem(input)))
}

/// Entry names are often full paths like `stuff\textures\logo.dds`.
fn entry_file_name(name: &str) -> String {
    name.rsplit(['\\', '/'])
        .next()
        .unwrap_or(name)
        .to_string()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("entry")
        .to_string()
}
