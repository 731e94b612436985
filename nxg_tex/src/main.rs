use clap::{Parser, Subcommand};

mod convert;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the header and directory contents of a texture or archive
    Info { input: String },
    /// Convert a texture or standalone image to PNG
    Decode {
        input: String,
        /// The output file. Defaults to the input with a png extension.
        output: Option<String>,
        /// The mip level to decode instead of the base level
        #[arg(long)]
        mipmap: Option<u32>,
    },
    /// Convert a PNG or TGA image to an uncompressed texture
    Encode {
        input: String,
        /// The output file. Defaults to the input with a txtr extension.
        output: Option<String>,
    },
    /// Extract all textures in an archive to a folder as PNG
    Extract {
        input: String,
        /// The output folder. Defaults to the parent folder of the input.
        output_folder: Option<String>,
        /// Write the entry bytes unmodified instead of decoding to PNG
        #[arg(long)]
        raw: bool,
    },
    /// Convert all textures matching a pattern like "**/*.txtr" to PNG
    Batch { root: String, pattern: String },
}

fn main() -> anyhow::Result<()> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Info { input } => convert::print_info(&input),
        Commands::Decode {
            input,
            output,
            mipmap,
        } => convert::decode_to_png(&input, output.as_deref(), mipmap),
        Commands::Encode { input, output } => convert::encode_to_txtr(&input, output.as_deref()),
        Commands::Extract {
            input,
            output_folder,
            raw,
        } => convert::extract_archive(&input, output_folder.as_deref(), raw),
        Commands::Batch { root, pattern } => convert::batch_decode(&root, &pattern),
    }
}
