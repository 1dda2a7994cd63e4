//! Build script: embeds the git hash and checks GPU toolkits before
//! whisper-rs-sys starts compiling.

use std::process::Command;

fn main() {
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    if cfg!(feature = "cuda") {
        require_tool("nvcc", &["--version"], "CUDA toolkit", "cuda");
    }
    if cfg!(feature = "vulkan") {
        require_tool("vulkaninfo", &["--summary"], "Vulkan SDK", "vulkan");
    }
    if cfg!(feature = "hipblas") {
        require_tool("rocminfo", &[], "ROCm", "hipblas");
    }
}

fn require_tool(tool: &str, args: &[&str], toolkit: &str, feature: &str) {
    match Command::new(tool).args(args).output() {
        Ok(out) if out.status.success() => {
            let version = parse_release(&String::from_utf8_lossy(&out.stdout));
            match version {
                Some((major, minor)) => {
                    println!("cargo::warning={toolkit} {major}.{minor} detected")
                }
                None => println!("cargo::warning={toolkit} detected"),
            }
        }
        _ => panic!(
            "\n\n`{tool}` not found: the {toolkit} is not installed.\n\
             Build without it: cargo build --release (drop --features {feature})\n"
        ),
    }
}

/// Parse "release X.Y" from toolkit version output.
fn parse_release(text: &str) -> Option<(u32, u32)> {
    let release_pos = text.find("release ")?;
    let after = &text[release_pos + 8..];
    let comma = after.find(',')?;
    let mut parts = after[..comma].split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}
