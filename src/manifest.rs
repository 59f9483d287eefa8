//! 生成マニフェスト。
//!
//! 生成物と並んで書き出される JSON。ツールのバージョン、入力ハッシュ、
//! 実際に出力へ現れたシンボル一覧と診断一覧を持ち、再生成の要否判定や
//! 生成結果の検査に使う。生成物本体の一部ではない。

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::mapping::CSig;
use crate::symbol::{Package, Symbol, TypeRef};
use crate::{synth, DiagnosticEntry};

#[derive(Debug, Serialize)]
pub struct Manifest {
  pub version: String,
  pub package: String,
  pub generated: String,
  pub input_hash: String,
  pub symbols: Vec<ManifestSymbol>,
  pub diagnostics: Vec<DiagnosticEntry>,
}

/// 出力に現れた一シンボル。`id` はネイティブ側のシンボル名。
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ManifestSymbol {
  pub id: String,
  pub kind: String,
}

/// 設定ファイルの内容とツールのバージョンから入力ハッシュを計算する。
/// SHA-256 の先頭 8 バイトを小文字 16 進で表す。
pub fn calculate_input_hash(config_content: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(env!("CARGO_PKG_VERSION").as_bytes());
  hasher.update(b"\n");
  hasher.update(config_content.as_bytes());
  let digest = hasher.finalize();
  let mut hex = String::new();
  for byte in digest.iter().take(8) {
    hex.push_str(&format!("{:02x}", byte));
  }
  hex
}

/// 出力へ実際に現れるシンボルを両エミッタと同じ順・同じ投影で集める。
/// 投影に失敗したシンボルは出力にも現れないため含めない。
pub fn collect_symbols(pkg: &Package) -> Vec<ManifestSymbol> {
  let mut symbols = Vec::new();

  for name in pkg.table.names() {
    if let Ok(Symbol::Type(def)) = pkg.table.sym(name) {
      if matches!(def.ty, TypeRef::Slice(_) | TypeRef::Array(_, _)) {
        symbols.push(ManifestSymbol {
          id: format!("{}_{}", pkg.name, def.name),
          kind: "type".to_string(),
        });
      }
    }
  }

  for func in pkg.funcs() {
    if let Ok(csig) = CSig::resolve(pkg, func) {
      symbols.push(ManifestSymbol {
        id: csig.id,
        kind: "func".to_string(),
      });
    }
  }

  for item in pkg.consts() {
    if let Ok(csig) = CSig::resolve(pkg, &synth::const_getter(item)) {
      symbols.push(ManifestSymbol {
        id: csig.id,
        kind: "const_get".to_string(),
      });
    }
  }

  for var in pkg.vars() {
    if let Ok(csig) = CSig::resolve(pkg, &synth::var_getter(&pkg.name, var)) {
      symbols.push(ManifestSymbol {
        id: csig.id,
        kind: "var_get".to_string(),
      });
    }
    if let Ok(csig) = CSig::resolve(pkg, &synth::var_setter(&pkg.name, var)) {
      symbols.push(ManifestSymbol {
        id: csig.id,
        kind: "var_set".to_string(),
      });
    }
  }

  symbols
}
