//! パッケージの公開シンボル表。
//!
//! 抽出器(パーサ・型検査)は本クレートの範囲外であり、ここでは設定ファイルに
//! 記述済みのシンボル表を閉じたタグ付きバリアントとして受け取る。列挙順は
//! 保存順に依存しない辞書順(バイト順)で固定し、二つの出力パスが同じ列を
//! 観測できるようにする。

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SymbolError {
  #[error("シンボルが見つかりません: {0}")]
  Lookup(String),
  #[error("シンボル名が重複しています: {0}")]
  Duplicate(String),
  #[error("型の指定が不正です: {0}")]
  InvalidType(String),
}

/// ネイティブ境界で扱う型の語彙。閉じた列挙として持ち、
/// 各エミッタは網羅的に分岐する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
  Bool,
  Int8,
  Int16,
  Int32,
  Int64,
  Int,
  Uint8,
  Uint16,
  Uint32,
  Uint64,
  Uint,
  Uintptr,
  Float32,
  Float64,
  String,
  Map,
  Chan,
  Interface,
  Error,
  Slice(Box<TypeRef>),
  Array(u64, Box<TypeRef>),
  Named(String),
}

impl TypeRef {
  /// 設定ファイル上の型表記を解析する。`[]T` はスライス、`[N]T` は配列、
  /// 既知の基底名以外の識別子は Named として保持する(対応可否は出力時に判定)。
  pub fn parse(text: &str) -> Result<TypeRef, SymbolError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
      return Err(SymbolError::InvalidType("空の型名です".to_string()));
    }
    if let Some(rest) = trimmed.strip_prefix("[]") {
      let elem = TypeRef::parse(rest)?;
      return Ok(TypeRef::Slice(Box::new(elem)));
    }
    if let Some(rest) = trimmed.strip_prefix('[') {
      let close = rest
        .find(']')
        .ok_or_else(|| SymbolError::InvalidType(trimmed.to_string()))?;
      let len: u64 = rest[..close]
        .trim()
        .parse()
        .map_err(|_| SymbolError::InvalidType(trimmed.to_string()))?;
      let elem = TypeRef::parse(&rest[close + 1..])?;
      return Ok(TypeRef::Array(len, Box::new(elem)));
    }
    let parsed = match trimmed {
      "bool" => TypeRef::Bool,
      "int8" => TypeRef::Int8,
      "int16" => TypeRef::Int16,
      "int32" | "rune" => TypeRef::Int32,
      "int64" => TypeRef::Int64,
      "int" => TypeRef::Int,
      "uint8" | "byte" => TypeRef::Uint8,
      "uint16" => TypeRef::Uint16,
      "uint32" => TypeRef::Uint32,
      "uint64" => TypeRef::Uint64,
      "uint" => TypeRef::Uint,
      "uintptr" => TypeRef::Uintptr,
      "float32" => TypeRef::Float32,
      "float64" => TypeRef::Float64,
      "string" => TypeRef::String,
      "map" => TypeRef::Map,
      "chan" => TypeRef::Chan,
      "interface" => TypeRef::Interface,
      "error" => TypeRef::Error,
      other => {
        if !is_identifier(other) {
          return Err(SymbolError::InvalidType(other.to_string()));
        }
        TypeRef::Named(other.to_string())
      }
    };
    Ok(parsed)
  }
}

impl fmt::Display for TypeRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TypeRef::Bool => write!(f, "bool"),
      TypeRef::Int8 => write!(f, "int8"),
      TypeRef::Int16 => write!(f, "int16"),
      TypeRef::Int32 => write!(f, "int32"),
      TypeRef::Int64 => write!(f, "int64"),
      TypeRef::Int => write!(f, "int"),
      TypeRef::Uint8 => write!(f, "uint8"),
      TypeRef::Uint16 => write!(f, "uint16"),
      TypeRef::Uint32 => write!(f, "uint32"),
      TypeRef::Uint64 => write!(f, "uint64"),
      TypeRef::Uint => write!(f, "uint"),
      TypeRef::Uintptr => write!(f, "uintptr"),
      TypeRef::Float32 => write!(f, "float32"),
      TypeRef::Float64 => write!(f, "float64"),
      TypeRef::String => write!(f, "string"),
      TypeRef::Map => write!(f, "map"),
      TypeRef::Chan => write!(f, "chan"),
      TypeRef::Interface => write!(f, "interface"),
      TypeRef::Error => write!(f, "error"),
      TypeRef::Slice(elem) => write!(f, "[]{elem}"),
      TypeRef::Array(len, elem) => write!(f, "[{len}]{elem}"),
      TypeRef::Named(name) => write!(f, "{name}"),
    }
  }
}

fn is_identifier(text: &str) -> bool {
  let mut chars = text.chars();
  match chars.next() {
    Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
    _ => return false,
  }
  chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// 引数・結果の記述子。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
  pub name: String,
  pub ty: TypeRef,
}

/// 順序付きの引数列・結果列。`fallible` は末尾結果がエラー相当であることを示す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
  pub params: Vec<Param>,
  pub results: Vec<Param>,
  pub fallible: bool,
}

/// 呼び出し可能シンボル。`id` がネイティブ側のシンボル名になる。
/// パッケージ宣言由来のものと、Var/Const 向けに合成されるものの双方がある。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Func {
  pub name: String,
  pub id: String,
  pub doc: String,
  pub sig: Signature,
  pub ret: Option<TypeRef>,
}

/// 名前付き複合型の宣言。スライス/配列のみ cdef へ投影できる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
  pub name: String,
  pub doc: String,
  pub ty: TypeRef,
}

/// 公開変数。アクセサはここへは保存せず、出力パスごとに合成し直す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Var {
  pub name: String,
  pub doc: String,
  pub ty: TypeRef,
}

/// 公開定数。構築時点で getter が関連付けられ、setter は存在しない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Const {
  pub name: String,
  pub doc: String,
  pub getter: Func,
}

impl Const {
  pub fn new(pkg_name: &str, name: &str, ty: TypeRef, doc: &str) -> Self {
    let getter = Func {
      name: name.to_string(),
      id: format!("{pkg_name}_{name}_get"),
      doc: format!("returns {pkg_name}.{name}"),
      sig: Signature {
        params: Vec::new(),
        results: vec![Param {
          name: "ret".to_string(),
          ty: ty.clone(),
        }],
        fallible: false,
      },
      ret: Some(ty),
    };
    Self {
      name: name.to_string(),
      doc: doc.to_string(),
      getter,
    }
  }
}

/// パッケージ内の一シンボル。種別ごとの真偽述語は設けず、
/// 利用側は常にこの列挙をマッチで処理する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
  Type(TypeDef),
  Func(Func),
  Const(Const),
  Var(Var),
}

impl Symbol {
  pub fn name(&self) -> &str {
    match self {
      Symbol::Type(t) => &t.name,
      Symbol::Func(f) => &f.name,
      Symbol::Const(c) => &c.name,
      Symbol::Var(v) => &v.name,
    }
  }
}

/// 一パッケージ分のシンボル表。`BTreeMap` を使い、列挙順を
/// 名前の辞書順に固定する。
#[derive(Debug, Default)]
pub struct SymbolTable {
  syms: BTreeMap<String, Symbol>,
}

impl SymbolTable {
  pub fn new() -> Self {
    Self {
      syms: BTreeMap::new(),
    }
  }

  pub fn insert(&mut self, sym: Symbol) -> Result<(), SymbolError> {
    let name = sym.name().to_string();
    if self.syms.contains_key(&name) {
      return Err(SymbolError::Duplicate(name));
    }
    self.syms.insert(name, sym);
    Ok(())
  }

  /// 全シンボル名を辞書順で返す。二回呼んでも同じ列になる。
  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.syms.keys().map(String::as_str)
  }

  pub fn sym(&self, name: &str) -> Result<&Symbol, SymbolError> {
    self
      .syms
      .get(name)
      .ok_or_else(|| SymbolError::Lookup(name.to_string()))
  }

  /// 名前付き型の宣言を引く。cdef へ投影済みの型参照の解決に使う。
  pub fn type_def(&self, name: &str) -> Option<&TypeDef> {
    match self.syms.get(name) {
      Some(Symbol::Type(def)) => Some(def),
      _ => None,
    }
  }
}

/// パッケージ本体。名前・ドキュメントとシンボル表を持つ。
#[derive(Debug)]
pub struct Package {
  pub name: String,
  pub doc: String,
  pub table: SymbolTable,
}

impl Package {
  /// 設定ファイル上の記述からパッケージを組み立てる。
  /// 型表記の解析エラーと名前重複はここで検出する。
  pub fn from_spec(spec: &PackageSpec) -> Result<Package, SymbolError> {
    if !is_identifier(&spec.name) {
      return Err(SymbolError::InvalidType(format!(
        "パッケージ名が不正です: {}",
        spec.name
      )));
    }
    let mut table = SymbolTable::new();
    for ty in &spec.types {
      table.insert(Symbol::Type(TypeDef {
        name: ty.name.clone(),
        doc: ty.doc.clone(),
        ty: TypeRef::parse(&ty.ty)?,
      }))?;
    }
    for func in &spec.functions {
      let mut params = Vec::new();
      for param in &func.params {
        params.push(Param {
          name: param.name.clone(),
          ty: TypeRef::parse(&param.ty)?,
        });
      }
      let mut results = Vec::new();
      for result in &func.results {
        results.push(Param {
          name: result.name.clone(),
          ty: TypeRef::parse(&result.ty)?,
        });
      }
      let ret = results.first().map(|r| r.ty.clone());
      if func.error {
        results.push(Param {
          name: "err".to_string(),
          ty: TypeRef::Error,
        });
      }
      table.insert(Symbol::Func(Func {
        name: func.name.clone(),
        id: format!("{}_{}", spec.name, func.name),
        doc: func.doc.clone(),
        sig: Signature {
          params,
          results,
          fallible: func.error,
        },
        ret,
      }))?;
    }
    for item in &spec.consts {
      let ty = TypeRef::parse(&item.ty)?;
      table.insert(Symbol::Const(Const::new(
        &spec.name, &item.name, ty, &item.doc,
      )))?;
    }
    for var in &spec.vars {
      table.insert(Symbol::Var(Var {
        name: var.name.clone(),
        doc: var.doc.clone(),
        ty: TypeRef::parse(&var.ty)?,
      }))?;
    }
    Ok(Package {
      name: spec.name.clone(),
      doc: spec.doc.clone(),
      table,
    })
  }

  /// 宣言由来の関数のみを辞書順で返す。
  pub fn funcs(&self) -> impl Iterator<Item = &Func> {
    self.table.syms.values().filter_map(|sym| match sym {
      Symbol::Func(f) => Some(f),
      _ => None,
    })
  }

  pub fn consts(&self) -> impl Iterator<Item = &Const> {
    self.table.syms.values().filter_map(|sym| match sym {
      Symbol::Const(c) => Some(c),
      _ => None,
    })
  }

  pub fn vars(&self) -> impl Iterator<Item = &Var> {
    self.table.syms.values().filter_map(|sym| match sym {
      Symbol::Var(v) => Some(v),
      _ => None,
    })
  }

  pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
    self.table.syms.values().filter_map(|sym| match sym {
      Symbol::Type(t) => Some(t),
      _ => None,
    })
  }
}

/// 設定ファイルへ埋め込まれるパッケージ記述。
#[derive(Debug, Clone, Deserialize)]
pub struct PackageSpec {
  pub name: String,
  #[serde(default)]
  pub doc: String,
  #[serde(default)]
  pub types: Vec<TypeSpec>,
  #[serde(default)]
  pub functions: Vec<FuncSpec>,
  #[serde(default)]
  pub consts: Vec<ConstSpec>,
  #[serde(default)]
  pub vars: Vec<VarSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypeSpec {
  pub name: String,
  #[serde(rename = "type")]
  pub ty: String,
  #[serde(default)]
  pub doc: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FuncSpec {
  pub name: String,
  #[serde(default)]
  pub doc: String,
  #[serde(default)]
  pub params: Vec<ParamSpec>,
  #[serde(default)]
  pub results: Vec<ParamSpec>,
  #[serde(default)]
  pub error: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParamSpec {
  pub name: String,
  #[serde(rename = "type")]
  pub ty: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConstSpec {
  pub name: String,
  #[serde(rename = "type")]
  pub ty: String,
  #[serde(default)]
  pub doc: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VarSpec {
  pub name: String,
  #[serde(rename = "type")]
  pub ty: String,
  #[serde(default)]
  pub doc: String,
}
