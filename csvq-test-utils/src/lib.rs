use std::io::Write;
use std::path::Path;
use std::sync::Once;

use tempfile::{NamedTempFile, TempDir};

static INIT: Once = Once::new();

/// Initialize tracing for test binaries. Safe to call multiple times.
pub fn init_tracing_for_tests() {
    INIT.call_once(|| {
        use tracing_subscriber::filter::EnvFilter;
        use tracing_subscriber::fmt;
        let env = std::env::var("RUST_LOG").ok();
        let filter = match env {
            Some(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            None => EnvFilter::new("info"),
        };
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_test_writer()
            .try_init();
    });
}

/// Write `lines` to a fresh temporary `.csv` file, one per line.
pub fn write_csv(lines: &[&str]) -> NamedTempFile {
    let mut tmp = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("create tmp csv");
    for line in lines {
        writeln!(tmp, "{line}").expect("write csv line");
    }
    tmp.flush().expect("flush csv");
    tmp
}

/// Write `lines` to `dir/name`, creating parent directories as needed.
pub fn write_csv_in(dir: &Path, name: &str, lines: &[&str]) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create fixture dir");
    }
    let mut body = lines.join("\n");
    body.push('\n');
    std::fs::write(&path, body).expect("write fixture");
}

/// Scratch directory holding the two-row `t.csv` fixture (`a,b` / `1,x` / `2,y`).
pub fn scenario_dir() -> TempDir {
    let dir = TempDir::new().expect("create tmp dir");
    write_csv_in(dir.path(), "t.csv", SCENARIO_CSV);
    dir
}

pub const SCENARIO_CSV: &[&str] = &["a,b", "1,x", "2,y"];
