//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// A stand-in for s3270 speaking its script protocol.
///
/// `PrintText(string)` echoes the startup arguments so tests can check the
/// command line. Hosts containing `unreachable` fail to connect, and
/// `String("CRASH")` makes the emulator die with a message on stderr.
/// With `FAKE_S3270_NOISE` set to a byte count, that much chatter goes to
/// stderr before every status line.
const FAKE_S3270: &str = r#"#!/bin/sh
args="$*"
host=""
noise="${FAKE_S3270_NOISE:-0}"

status() {
    if [ "$noise" -gt 0 ]; then
        head -c "$noise" /dev/zero | tr '\0' . >&2
    fi
    if [ -n "$host" ]; then
        echo "U F U C($host) I 2 24 80 0 0 0x0 0.000"
    else
        echo "L U U N N 2 24 80 0 0 0x0 -"
    fi
}

while IFS= read -r line; do
    case "$line" in
        Connect\(*unreachable*\))
            echo "data: Connect to unreachable: Name or service not known"
            status
            echo error
            ;;
        Connect\(*\))
            target=${line#*:}
            target=${target%?}
            host=${target#*@}
            status
            echo ok
            ;;
        Disconnect)
            host=""
            status
            echo ok
            ;;
        'PrintText(string)')
            echo "data: FAKE S3270 $args"
            echo "data: READY"
            status
            echo ok
            ;;
        Ascii\(*)
            echo "data: READY"
            status
            echo ok
            ;;
        'String("CRASH")')
            echo "fake emulator crashed" >&2
            exit 3
            ;;
        Quit)
            exit 0
            ;;
        *)
            status
            echo ok
            ;;
    esac
done
"#;

/// Path of the fake emulator, written once per test process.
pub fn fake_emulator() -> &'static Path {
    static PATH: OnceLock<PathBuf> = OnceLock::new();
    PATH.get_or_init(|| write_script("fake-s3270", FAKE_S3270))
}

/// The fake emulator wrapped so it writes `bytes` of stderr per reply.
pub fn noisy_emulator(bytes: usize) -> PathBuf {
    let body = format!(
        "#!/bin/sh\nFAKE_S3270_NOISE={bytes} exec {} \"$@\"\n",
        fake_emulator().display()
    );
    write_script(&format!("noisy-s3270-{bytes}"), &body)
}

fn write_script(name: &str, body: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("{name}-{}", std::process::id()));
    std::fs::write(&path, body).expect("failed to write fake emulator");
    std::fs::set_permissions(&path, Permissions::from_mode(0o755))
        .expect("failed to make fake emulator executable");
    path
}
