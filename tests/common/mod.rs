//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const ORDER_TABLE: &str = r#"[
  {"numero_commande": "rt 001400", "classification_interimaire": "A2", "statut": "OP - Opérateur"},
  {"numero_commande": "RT000777", "classification_interimaire": "C1", "statut": "6A"}
]"#;

pub const TWO_CONTRACTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Envelope xmlns="urn:hr-xml">
  <Assignment>
    <ReferenceInformation>
      <OrderId><IdValue>RT001400</IdValue></OrderId>
      <AssignmentId><IdValue>A-1</IdValue></AssignmentId>
    </ReferenceInformation>
    <PositionCharacteristics>
      <PositionLevel>C1</PositionLevel>
    </PositionCharacteristics>
  </Assignment>
  <Assignment>
    <ReferenceInformation>
      <OrderId><IdValue>RT009999</IdValue></OrderId>
    </ReferenceInformation>
    <PositionCharacteristics>
      <PositionLevel>B3</PositionLevel>
      <PositionCoefficient/>
      <PositionStatus><Code>EM</Code></PositionStatus>
    </PositionCharacteristics>
  </Assignment>
</Envelope>
"#;

/// Temporary working directory holding fixture files for one test.
pub struct Workspace {
    dir: TempDir,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture dir");
        }
        fs::write(&path, contents).expect("write fixture");
        path
    }

    pub fn read(&self, name: &str) -> Vec<u8> {
        fs::read(self.dir.path().join(name)).expect("read output")
    }

    pub fn read_text(&self, name: &str) -> String {
        String::from_utf8(self.read(name)).expect("utf-8 output")
    }

    /// Run `hrxe` with `args` from inside the workspace.
    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_hrxe"))
            .current_dir(self.dir.path())
            .args(args)
            .output()
            .expect("spawn hrxe")
    }

    /// Run `hrxe` and require success.
    pub fn run_ok(&self, args: &[&str]) -> Output {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "hrxe {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        output
    }

    pub fn run_json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.run_ok(args);
        serde_json::from_slice(&output.stdout).expect("JSON stdout")
    }
}
