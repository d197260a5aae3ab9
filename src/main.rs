//! One-shot command-line front end for `volfs` volumes.

use std::env::args;
use std::fs;
use std::io::Write;
use std::process::exit;

use volfs::{FsError, Volume};

const USAGE: &str = "usage: volfs <command> <volume> [args]
  create <volume> <blocksize> <nblocks>
  mkdir  <volume> <path>
  rmdir  <volume> <path>
  write  <volume> <path> <hostfile>
  read   <volume> <path> [hostfile]
  rm     <volume> <path>
  ls     <volume> [path]
  stat   <volume> <path>
  map    <volume>
  defrag <volume>";

fn usage() -> ! {
    eprintln!("{USAGE}");
    exit(2);
}

fn main() {
    let args = args().collect::<Vec<String>>();
    if args.len() < 3 {
        usage();
    }
    let volume = &args[2];

    let result = match (args[1].as_str(), &args[3..]) {
        ("create", [blocksize, nblocks]) => {
            let (Ok(blocksize), Ok(nblocks)) = (blocksize.parse(), nblocks.parse()) else {
                usage();
            };
            volfs::mkvolume(volume, blocksize, nblocks)
        }
        ("mkdir", [path]) => volfs::mkdir(volume, path),
        ("rmdir", [path]) => volfs::rmdir(volume, path),
        ("write", [path, hostfile]) => match fs::read(hostfile) {
            Ok(data) => volfs::writefile(volume, path, &data),
            Err(e) => {
                eprintln!("volfs: cannot read {hostfile}: {e}");
                exit(1);
            }
        },
        ("read", [path, rest @ ..]) if rest.len() <= 1 => {
            volfs::readfile(volume, path).and_then(|data| match rest.first() {
                Some(hostfile) => fs::write(hostfile, &data).map_err(FsError::Io),
                None => std::io::stdout().write_all(&data).map_err(FsError::Io),
            })
        }
        ("rm", [path]) => volfs::rmfile(volume, path),
        ("ls", rest) if rest.len() <= 1 => {
            let path = rest.first().map(String::as_str).unwrap_or("");
            volfs::dirinfo(volume, path).map(|info| {
                for name in &info.entries {
                    println!("{name}");
                }
            })
        }
        ("stat", [path]) => volfs::fileinfo(volume, path).map(|info| {
            println!("{} {} {}", info.length, info.modtime, path);
        }),
        ("map", []) => Volume::open_readonly(volume).map(|vol| {
            let glyphs = vol.kinds().iter().map(|k| k.glyph()).collect::<String>();
            println!("{glyphs}");
        }),
        ("defrag", []) => volfs::defrag(volume),
        _ => usage(),
    };

    if let Err(e) = result {
        eprintln!("volfs: {e}");
        exit(1);
    }
}
