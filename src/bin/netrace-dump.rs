use anyhow::{Context as _, Result};
use netrace::Context;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(
    about = "Prints the header and packets of a netrace network-on-chip trace file. Compressed traces (.bz2) are decompressed on the fly through bzip2."
)]
struct Opt {
    #[structopt(
        short,
        long,
        help = "Start replay at this region of the trace instead of at the beginning"
    )]
    region: Option<usize>,

    #[structopt(
        short = "-l",
        long = "--limit",
        help = "Stop after printing this many packets"
    )]
    limit: Option<u64>,

    #[structopt(long, help = "Only print the trace header")]
    header_only: bool,

    #[structopt(name = "FILE", parse(from_os_str))]
    file: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let mut ctx = Context::new();
    ctx.open(&opt.file)
        .with_context(|| format!("Failed to open {:?}", opt.file))?;
    // A dump never retires packets, so skip the registry bookkeeping.
    ctx.disable_dependencies()?;

    println!("{}", ctx.header()?);
    if opt.header_only {
        return Ok(());
    }

    let mut remaining = match opt.region {
        Some(index) => {
            ctx.seek_region_index(index)
                .with_context(|| format!("Failed to seek to region {}", index))?;
            ctx.header()?.regions[index].num_packets
        }
        None => ctx.header()?.num_packets,
    };
    if let Some(limit) = opt.limit {
        remaining = remaining.min(limit);
    }

    while remaining > 0 {
        match ctx.read_packet()? {
            Some(packet) => println!("  {}", packet),
            None => break,
        }
        remaining -= 1;
    }

    Ok(())
}
