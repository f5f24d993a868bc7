use std::io::Write;
use std::path::PathBuf;

use pwned_lookup::sha1_hex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

const ALL_CHARS: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Random passwords from a fixed seed so runs stay comparable.
pub fn generate_random_passwords(count: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let length = rng.gen_range(8..=64);
            (0..length)
                .map(|_| ALL_CHARS[rng.gen_range(0..ALL_CHARS.len())] as char)
                .collect()
        })
        .collect()
}

/// A corpus of `HASH:COUNT` lines on disk, kept alive with its directory.
pub struct Corpus {
    _dir: TempDir,
    pub path: PathBuf,
    pub members: Vec<String>,
}

/// Writes `lines` corpus entries. `sorted` orders them by digest.
pub fn build_corpus(lines: usize, sorted: bool) -> Corpus {
    let members = generate_random_passwords(lines, 7);
    let mut digests: Vec<String> = members.iter().map(|p| sha1_hex(p)).collect();
    if sorted {
        digests.sort_unstable();
    }

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("corpus.txt");
    let mut file = std::io::BufWriter::new(std::fs::File::create(&path).unwrap());
    let mut rng = StdRng::seed_from_u64(11);
    for digest in &digests {
        writeln!(file, "{}:{}", digest, rng.gen_range(1..100_000)).unwrap();
    }
    file.flush().unwrap();

    Corpus { _dir: dir, path, members }
}
