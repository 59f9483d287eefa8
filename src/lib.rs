//! cffi-bindgen ライブラリ。
//!
//! 設定ファイルに記述されたパッケージのシンボル表から、共有オブジェクトを
//! 呼び出す CFFI ラッパー(単一の Python ファイル)と生成マニフェストを
//! 書き出す。生成は常に全体の書き直しで、cdef ブロック → ラッパーブロックの
//! 順に一つのバッファへ追記される。投影できない型は診断として積まれるだけで
//! 生成自体は最後まで進む。診断の有無は `RunResult::diagnostics` で確認する。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod cdef;
pub mod mapping;
pub mod manifest;
pub mod printer;
pub mod symbol;
pub mod synth;
pub mod wrapper;

use cdef::CdefEmitter;
use manifest::Manifest;
use printer::Printer;
use symbol::{Package, PackageSpec};
use wrapper::WrapperEmitter;

#[derive(Debug, Deserialize, Clone)]
pub struct BindgenConfig {
  pub package: PackageSpec,
  pub output: String,
  pub manifest: String,
}

impl BindgenConfig {
  fn apply_overrides(&mut self, cli: &CliOptions) {
    if let Some(value) = &cli.output {
      self.output = value.clone();
    }
    if let Some(value) = &cli.manifest {
      self.manifest = value.clone();
    }
  }

  fn validate(&self) -> Result<(), BindgenError> {
    if self.output.trim().is_empty() {
      return Err(BindgenError::ConfigInvalid("output が空です".to_string()));
    }
    if self.manifest.trim().is_empty() {
      return Err(BindgenError::ConfigInvalid("manifest が空です".to_string()));
    }
    Ok(())
  }
}

#[derive(Debug, Default, Clone)]
pub struct CliOptions {
  pub config_path: Option<PathBuf>,
  pub output: Option<String>,
  pub manifest: Option<String>,
}

/// 生成を止めない問題の記録。cdef へ投影できない型などが積まれる。
#[derive(Debug, Serialize, Clone)]
pub struct DiagnosticEntry {
  pub code: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub symbol: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub c_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub hint: Option<String>,
}

#[derive(Debug)]
pub struct RunResult {
  pub output_path: PathBuf,
  pub manifest_path: PathBuf,
  pub diagnostics: Vec<DiagnosticEntry>,
  pub manifest: Manifest,
}

#[derive(Debug, Error)]
pub enum BindgenError {
  #[error("設定ファイルが不正です: {0}")]
  ConfigInvalid(String),
  #[error("生成に失敗しました: {0}")]
  GenerateFailed(String),
}

pub fn load_config(config_path: &Path) -> Result<BindgenConfig, BindgenError> {
  let content = fs::read_to_string(config_path)
    .map_err(|err| BindgenError::ConfigInvalid(err.to_string()))?;
  parse_config(&content)
}

fn parse_config(content: &str) -> Result<BindgenConfig, BindgenError> {
  let config: BindgenConfig =
    toml::from_str(content).map_err(|err| BindgenError::ConfigInvalid(err.to_string()))?;
  config.validate()?;
  Ok(config)
}

/// 一パッケージ分の生成結果。
#[derive(Debug)]
pub struct Generated {
  pub artifact: String,
  pub diagnostics: Vec<DiagnosticEntry>,
}

/// 生成物本体を組み立てる。cdef ブロックを全て出し終えてから
/// ラッパーブロックを出す。両パスの間に割り込みはない。
pub fn generate(pkg: &Package) -> Generated {
  let mut out = Printer::new();
  let mut diagnostics = Vec::new();
  CdefEmitter::new(pkg, &mut out, &mut diagnostics).emit();
  WrapperEmitter::new(pkg, &mut out).emit();
  Generated {
    artifact: out.finish(),
    diagnostics,
  }
}

pub fn run_bindgen(config_path: &Path, cli: &CliOptions) -> Result<RunResult, BindgenError> {
  let content = fs::read_to_string(config_path)
    .map_err(|err| BindgenError::ConfigInvalid(err.to_string()))?;
  let mut config = parse_config(&content)?;
  config.apply_overrides(cli);
  config.validate()?;

  let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
  let output_path = resolve_path(config_dir, &config.output);
  let manifest_path = resolve_path(config_dir, &config.manifest);

  let input_hash = manifest::calculate_input_hash(&content);

  let pkg =
    Package::from_spec(&config.package).map_err(|err| BindgenError::ConfigInvalid(err.to_string()))?;

  let generated = generate(&pkg);
  let mut diagnostics = generated.diagnostics;

  write_file(&output_path, &generated.artifact, &mut diagnostics)?;

  let manifest = Manifest {
    version: "0.1".to_string(),
    package: pkg.name.clone(),
    generated: output_path.to_string_lossy().to_string(),
    input_hash,
    symbols: manifest::collect_symbols(&pkg),
    diagnostics: diagnostics.clone(),
  };

  let manifest_json = serde_json::to_string_pretty(&manifest)
    .map_err(|err| BindgenError::GenerateFailed(err.to_string()))?;
  write_file(&manifest_path, &manifest_json, &mut diagnostics)?;

  Ok(RunResult {
    output_path,
    manifest_path,
    diagnostics,
    manifest,
  })
}

fn resolve_path(base: &Path, value: &str) -> PathBuf {
  let path = Path::new(value);
  if path.is_absolute() {
    path.to_path_buf()
  } else {
    base.join(path)
  }
}

fn write_file(
  path: &Path,
  content: &str,
  diagnostics: &mut Vec<DiagnosticEntry>,
) -> Result<(), BindgenError> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).map_err(|err| BindgenError::GenerateFailed(err.to_string()))?;
  }
  if path.exists() {
    diagnostics.push(DiagnosticEntry {
      code: "ffi.bindgen.output_overwrite".to_string(),
      symbol: None,
      c_type: None,
      reason: Some("output_exists".to_string()),
      hint: Some("overwrite".to_string()),
    });
  }
  fs::write(path, content).map_err(|err| BindgenError::GenerateFailed(err.to_string()))
}
