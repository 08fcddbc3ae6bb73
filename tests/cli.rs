use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use bendecode::{InspectOptions, OutputFormat, inspect_path};
use tempfile::TempDir;

const SINGLE: &[u8] = b"d8:announce35:http://tracker.example.com/announce13:creation datei1700000000e4:infod6:lengthi12345e4:name8:file.bin12:piece lengthi16384e6:pieces20:aaaaaaaaaaaaaaaaaaaaee";

fn write(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn run(args: &[&Path]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bendecode"))
        .args(["--jobs", "2"])
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn test_good_and_broken_torrents() {
    let dir = TempDir::new().unwrap();
    let good = write(&dir, "good.torrent", SINGLE);
    let broken = write(&dir, "broken.torrent", b"d8:announce");
    let notes = write(&dir, "notes.txt", b"not a torrent");

    let output = run(&[&good, &broken, &notes]);
    assert_eq!(output.status.code(), Some(1));

    let expected = inspect_path(&good, &InspectOptions::default())
        .unwrap()
        .render(OutputFormat::Text, false)
        .unwrap();
    assert_eq!(String::from_utf8(output.stdout).unwrap(), expected);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(&format!("Error processing {}: ", broken.display())));
    assert!(stderr.contains(&format!("Skipping invalid file: {}", notes.display())));
    assert!(!stderr.contains(&format!("Error processing {}", good.display())));
}

#[test]
fn test_reports_keep_input_order() {
    let dir = TempDir::new().unwrap();
    let paths: Vec<PathBuf> = (0..6).map(|i| write(&dir, &format!("{}.torrent", i), SINGLE)).collect();
    let args: Vec<&Path> = paths.iter().rev().map(PathBuf::as_path).collect();

    let output = run(&args);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let positions: Vec<usize> = args
        .iter()
        .map(|path| stdout.find(&format!("torrent file : {}\n", path.display())).unwrap())
        .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
}
