//! Integration tests for the qs CLI against a live S3-compatible server
//!
//! Needs any S3-compatible server with an existing bucket, e.g.:
//! ```bash
//! docker run -d -p 9000:9000 -e MINIO_ROOT_USER=accesskey \
//!     -e MINIO_ROOT_PASSWORD=secretkey minio/minio server /data
//!
//! TEST_S3_ENDPOINT=http://localhost:9000 TEST_S3_ACCESS_KEY=accesskey \
//! TEST_S3_SECRET_KEY=secretkey TEST_S3_BUCKET=qs-test \
//!     cargo test --features integration
//! ```

#![cfg(feature = "integration")]

use std::path::Path;
use std::process::{Command, Output};

use anyhow::{Context, Result};
use tempfile::TempDir;

struct LiveEnv {
    config: TempDir,
    work: TempDir,
    /// Unique top-level directory so runs never collide
    root: String,
}

/// S3 test configuration from environment
fn test_config() -> Option<(String, String, String, String)> {
    let endpoint = std::env::var("TEST_S3_ENDPOINT").ok()?;
    let access_key = std::env::var("TEST_S3_ACCESS_KEY").ok()?;
    let secret_key = std::env::var("TEST_S3_SECRET_KEY").ok()?;
    let bucket = std::env::var("TEST_S3_BUCKET").unwrap_or_else(|_| "qs-test".to_string());
    Some((endpoint, access_key, secret_key, bucket))
}

fn unique_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{:x}", duration.as_nanos() % 0xFFFF_FFFF)
}

impl LiveEnv {
    fn setup() -> Option<Self> {
        let (endpoint, access_key, secret_key, bucket) = test_config()?;
        let env = Self {
            config: TempDir::new().ok()?,
            work: TempDir::new().ok()?,
            root: format!("qs-it-{}", unique_suffix()),
        };

        let output = env.run(&[
            "profile",
            "set",
            "test",
            &endpoint,
            &access_key,
            &secret_key,
            &bucket,
            "--default",
        ]);
        if !output.status.success() {
            eprintln!(
                "Failed to set profile: {}",
                String::from_utf8_lossy(&output.stderr)
            );
            return None;
        }
        Some(env)
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_qs"))
            .args(args)
            .env("QS_CONFIG_DIR", self.config.path())
            .env_remove("QS_PROFILE")
            .current_dir(self.work.path())
            .output()
            .expect("Failed to execute qs command")
    }

    fn write(&self, rel: &str, contents: &str) {
        let path = self.work.path().join(&self.root).join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn json(&self, args: &[&str]) -> Result<serde_json::Value> {
        let output = self.run(args);
        anyhow::ensure!(
            output.status.success(),
            "qs {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).context("stdout is not JSON")
    }
}

impl Drop for LiveEnv {
    fn drop(&mut self) {
        let _ = self.run(&["rm", &format!("{}/", self.root)]);
    }
}

fn names(value: &serde_json::Value) -> Vec<(String, bool)> {
    let mut names: Vec<(String, bool)> = value["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|i| {
                    (
                        i["name"].as_str().unwrap_or_default().to_string(),
                        i["is_dir"].as_bool().unwrap_or(false),
                    )
                })
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[test]
fn test_push_list_pull_remove() -> Result<()> {
    let Some(env) = LiveEnv::setup() else {
        eprintln!("Skipping: S3 test configuration not available");
        return Ok(());
    };

    env.write("a/1.txt", "one");
    env.write("a/2.txt", "two");
    env.write("a/b/3.txt", "three");

    let pushed = env.json(&["--json", "push", "-r", &env.root])?;
    assert_eq!(pushed["total"], 3);
    assert_eq!(pushed["status"], "success");

    let listing = env.json(&["--json", "ls", &format!("{}/a", env.root)])?;
    assert_eq!(
        names(&listing),
        vec![
            ("1.txt".to_string(), false),
            ("2.txt".to_string(), false),
            ("b".to_string(), true),
        ]
    );

    let key = format!("{}/a/b/3.txt", env.root);
    let out = env.work.path().join("downloads");
    let output = env.run(&["pull", &key, &out.display().to_string()]);
    assert!(output.status.success());
    assert_eq!(std::fs::read_to_string(out.join("3.txt"))?, "three");

    let output = env.run(&["cat", &key, "--offset", "2"]);
    assert_eq!(String::from_utf8_lossy(&output.stdout), "ree");

    let removed = env.json(&["--json", "rm", &format!("{}/a/", env.root)])?;
    assert_eq!(removed["deleted"], 3);

    let listing = env.json(&["--json", "ls", &format!("{}/a", env.root)])?;
    assert!(names(&listing).is_empty());
    Ok(())
}

#[test]
fn test_signed_url_embeds_expiry() -> Result<()> {
    let Some(env) = LiveEnv::setup() else {
        eprintln!("Skipping: S3 test configuration not available");
        return Ok(());
    };

    env.write("jp.gif", "GIF89a");
    let file = Path::new(&env.root).join("jp.gif");
    env.json(&["--json", "push", &file.display().to_string()])?;

    let value = env.json(&["--json", "url", &format!("{}/jp.gif", env.root), "--ttl", "600"])?;
    let url = value["url"].as_str().unwrap_or_default();
    assert!(url.contains("X-Amz-Expires=600"));
    assert_eq!(value["expires_in_secs"], 600);
    Ok(())
}
