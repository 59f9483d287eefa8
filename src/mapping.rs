//! シグネチャのネイティブ投影。
//!
//! cdef パスとラッパーパスの両方が同じ投影を通ることで、extern 宣言の
//! 名前集合とスタブが呼ぶ名前集合が食い違わないようにする。投影できない
//! 型は診断として呼び出し側へ返し、処理自体は打ち切らない。

use std::collections::BTreeMap;

use once_cell::sync::Lazy;

use crate::symbol::{Func, Package, TypeRef};
use crate::DiagnosticEntry;

/// プリミティブ変換器の選択キー。`Raw` は変換なしの素通しを表す。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConvKind {
  Str,
  Int,
  Uint,
  Float32,
  Float64,
  Raw,
}

static CONVERTER_SUFFIX: Lazy<BTreeMap<ConvKind, &'static str>> = Lazy::new(|| {
  BTreeMap::from([
    (ConvKind::Str, "string"),
    (ConvKind::Int, "int"),
    (ConvKind::Uint, "uint"),
    (ConvKind::Float32, "float32"),
    (ConvKind::Float64, "float64"),
  ])
});

impl ConvKind {
  /// 登録済み変換器の名前末尾(`cffi_cgopy_cnv_py2c_<suffix>` 等)。
  /// `Raw` には対応する変換器が無い。
  pub fn suffix(self) -> Option<&'static str> {
    CONVERTER_SUFFIX.get(&self).copied()
  }

  pub fn of(ty: &TypeRef) -> ConvKind {
    match ty {
      TypeRef::String => ConvKind::Str,
      TypeRef::Bool
      | TypeRef::Int8
      | TypeRef::Int16
      | TypeRef::Int32
      | TypeRef::Int64
      | TypeRef::Int => ConvKind::Int,
      TypeRef::Uint8
      | TypeRef::Uint16
      | TypeRef::Uint32
      | TypeRef::Uint64
      | TypeRef::Uint
      | TypeRef::Uintptr => ConvKind::Uint,
      TypeRef::Float32 => ConvKind::Float32,
      TypeRef::Float64 => ConvKind::Float64,
      TypeRef::Map
      | TypeRef::Chan
      | TypeRef::Interface
      | TypeRef::Error
      | TypeRef::Slice(_)
      | TypeRef::Array(_, _)
      | TypeRef::Named(_) => ConvKind::Raw,
    }
  }
}

/// ネイティブ側の型名へ写す。Named はパッケージ内で cdef に出せる
/// 型宣言(スライス/配列)を持つ場合だけ解決できる。
pub fn c_type(ty: &TypeRef, pkg: &Package) -> Option<String> {
  let name = match ty {
    TypeRef::Bool => "GoUint8",
    TypeRef::Int8 => "GoInt8",
    TypeRef::Int16 => "GoInt16",
    TypeRef::Int32 => "GoInt32",
    TypeRef::Int64 => "GoInt64",
    TypeRef::Int => "GoInt",
    TypeRef::Uint8 => "GoUint8",
    TypeRef::Uint16 => "GoUint16",
    TypeRef::Uint32 => "GoUint32",
    TypeRef::Uint64 => "GoUint64",
    TypeRef::Uint => "GoUint",
    TypeRef::Uintptr => "GoUintptr",
    TypeRef::Float32 => "GoFloat32",
    TypeRef::Float64 => "GoFloat64",
    TypeRef::String => "GoString",
    TypeRef::Map => "GoMap",
    TypeRef::Chan => "GoChan",
    TypeRef::Interface | TypeRef::Error => "GoInterface",
    TypeRef::Slice(_) | TypeRef::Array(_, _) => "GoSlice",
    TypeRef::Named(inner) => {
      let def = pkg.table.type_def(inner)?;
      match def.ty {
        TypeRef::Slice(_) | TypeRef::Array(_, _) => {
          return Some(format!("{}_{}", pkg.name, inner));
        }
        _ => return None,
      }
    }
  };
  Some(name.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CArg {
  pub name: String,
  pub c_type: String,
  pub conv: ConvKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CRet {
  Void,
  Single { c_type: String, conv: ConvKind },
  ErrorOnly,
  Pair { c_type: String, conv: ConvKind },
}

/// 一関数ぶんの投影結果。両エミッタはこの値だけを見て出力する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CSig {
  pub id: String,
  pub args: Vec<CArg>,
  pub ret: CRet,
}

impl CSig {
  /// 投影する。失敗した型ごとに診断を積み、一つでも失敗があれば
  /// シグネチャ全体を投影不能として返す。
  pub fn resolve(pkg: &Package, func: &Func) -> Result<CSig, Vec<DiagnosticEntry>> {
    let mut diagnostics = Vec::new();
    let mut args = Vec::new();
    for param in &func.sig.params {
      match c_type(&param.ty, pkg) {
        Some(c_type) => args.push(CArg {
          name: param.name.clone(),
          c_type,
          conv: ConvKind::of(&param.ty),
        }),
        None => diagnostics.push(unknown_type(&func.id, &param.ty)),
      }
    }

    let ret = if func.sig.fallible {
      match func.sig.results.len() {
        1 => Some(CRet::ErrorOnly),
        2 => match c_type(&func.sig.results[0].ty, pkg) {
          Some(c_type) => Some(CRet::Pair {
            c_type,
            conv: ConvKind::of(&func.sig.results[0].ty),
          }),
          None => {
            diagnostics.push(unknown_type(&func.id, &func.sig.results[0].ty));
            None
          }
        },
        _ => {
          diagnostics.push(unknown_result(&func.id, func.sig.results.len()));
          None
        }
      }
    } else {
      match func.sig.results.len() {
        0 => Some(CRet::Void),
        1 => match c_type(&func.sig.results[0].ty, pkg) {
          Some(c_type) => Some(CRet::Single {
            c_type,
            conv: ConvKind::of(&func.sig.results[0].ty),
          }),
          None => {
            diagnostics.push(unknown_type(&func.id, &func.sig.results[0].ty));
            None
          }
        },
        n => {
          diagnostics.push(unknown_result(&func.id, n));
          None
        }
      }
    };

    match (ret, diagnostics.is_empty()) {
      (Some(ret), true) => Ok(CSig {
        id: func.id.clone(),
        args,
        ret,
      }),
      (_, _) => Err(diagnostics),
    }
  }

  /// `(T, error)` 形の戻り値を運ぶ構造体の typedef 名。
  pub fn ret_struct_name(&self) -> Option<String> {
    match self.ret {
      CRet::Pair { .. } => Some(format!("cgo_func_{}_return", self.id)),
      _ => None,
    }
  }
}

fn unknown_type(symbol: &str, ty: &TypeRef) -> DiagnosticEntry {
  DiagnosticEntry {
    code: "ffi.cdef.unknown_type".to_string(),
    symbol: Some(symbol.to_string()),
    c_type: Some(ty.to_string()),
    reason: Some("unsupported_type".to_string()),
    hint: Some("対応する C 型がありません".to_string()),
  }
}

fn unknown_result(symbol: &str, count: usize) -> DiagnosticEntry {
  DiagnosticEntry {
    code: "ffi.cdef.unknown_result".to_string(),
    symbol: Some(symbol.to_string()),
    c_type: None,
    reason: Some(format!("unsupported_result_shape:{count}")),
    hint: Some("多値戻り値は (T, error) までです".to_string()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::symbol::{Package, PackageSpec, Param, Signature};

  fn empty_pkg(name: &str) -> Package {
    Package::from_spec(&PackageSpec {
      name: name.to_string(),
      doc: String::new(),
      types: Vec::new(),
      functions: Vec::new(),
      consts: Vec::new(),
      vars: Vec::new(),
    })
    .expect("package")
  }

  fn func(id: &str, params: Vec<Param>, results: Vec<Param>, fallible: bool) -> Func {
    Func {
      name: id.to_string(),
      id: id.to_string(),
      doc: String::new(),
      sig: Signature {
        params,
        results,
        fallible,
      },
      ret: None,
    }
  }

  #[test]
  fn converter_kinds_cover_primitives() {
    assert_eq!(ConvKind::of(&TypeRef::String), ConvKind::Str);
    assert_eq!(ConvKind::of(&TypeRef::Bool), ConvKind::Int);
    assert_eq!(ConvKind::of(&TypeRef::Int32), ConvKind::Int);
    assert_eq!(ConvKind::of(&TypeRef::Uintptr), ConvKind::Uint);
    assert_eq!(ConvKind::of(&TypeRef::Float32), ConvKind::Float32);
    assert_eq!(ConvKind::of(&TypeRef::Float64), ConvKind::Float64);
    assert_eq!(ConvKind::of(&TypeRef::Interface), ConvKind::Raw);
    assert_eq!(ConvKind::Raw.suffix(), None);
    assert_eq!(ConvKind::Str.suffix(), Some("string"));
  }

  #[test]
  fn resolve_maps_simple_signature() {
    let pkg = empty_pkg("hello");
    let f = func(
      "hello_Add",
      vec![
        Param {
          name: "a".to_string(),
          ty: TypeRef::Int,
        },
        Param {
          name: "b".to_string(),
          ty: TypeRef::Int,
        },
      ],
      vec![Param {
        name: "ret".to_string(),
        ty: TypeRef::Int,
      }],
      false,
    );
    let csig = CSig::resolve(&pkg, &f).expect("resolve");
    assert_eq!(csig.args.len(), 2);
    assert_eq!(csig.args[0].c_type, "GoInt");
    assert_eq!(
      csig.ret,
      CRet::Single {
        c_type: "GoInt".to_string(),
        conv: ConvKind::Int
      }
    );
    assert_eq!(csig.ret_struct_name(), None);
  }

  #[test]
  fn resolve_builds_return_struct_for_fallible_pair() {
    let pkg = empty_pkg("hello");
    let f = func(
      "hello_Div",
      Vec::new(),
      vec![
        Param {
          name: "ret".to_string(),
          ty: TypeRef::Float64,
        },
        Param {
          name: "err".to_string(),
          ty: TypeRef::Error,
        },
      ],
      true,
    );
    let csig = CSig::resolve(&pkg, &f).expect("resolve");
    assert_eq!(
      csig.ret,
      CRet::Pair {
        c_type: "GoFloat64".to_string(),
        conv: ConvKind::Float64
      }
    );
    assert_eq!(
      csig.ret_struct_name().expect("struct name"),
      "cgo_func_hello_Div_return"
    );
  }

  #[test]
  fn resolve_accumulates_every_unmappable_type() {
    let pkg = empty_pkg("hello");
    let f = func(
      "hello_Bad",
      vec![
        Param {
          name: "a".to_string(),
          ty: TypeRef::Named("Missing".to_string()),
        },
        Param {
          name: "b".to_string(),
          ty: TypeRef::Named("AlsoMissing".to_string()),
        },
      ],
      Vec::new(),
      false,
    );
    let diags = CSig::resolve(&pkg, &f).expect_err("must fail");
    assert_eq!(diags.len(), 2);
    assert!(diags.iter().all(|d| d.code == "ffi.cdef.unknown_type"));
  }

  #[test]
  fn named_type_resolves_only_to_declared_slice_types() {
    let pkg = Package::from_spec(&PackageSpec {
      name: "hello".to_string(),
      doc: String::new(),
      types: vec![crate::symbol::TypeSpec {
        name: "IntSlice".to_string(),
        ty: "[]int".to_string(),
        doc: String::new(),
      }],
      functions: Vec::new(),
      consts: Vec::new(),
      vars: Vec::new(),
    })
    .expect("package");
    assert_eq!(
      c_type(&TypeRef::Named("IntSlice".to_string()), &pkg),
      Some("hello_IntSlice".to_string())
    );
    assert_eq!(c_type(&TypeRef::Named("Other".to_string()), &pkg), None);
  }

  #[test]
  fn unsupported_result_shape_is_diagnosed() {
    let pkg = empty_pkg("hello");
    let f = func(
      "hello_Multi",
      Vec::new(),
      vec![
        Param {
          name: "a".to_string(),
          ty: TypeRef::Int,
        },
        Param {
          name: "b".to_string(),
          ty: TypeRef::Int,
        },
      ],
      false,
    );
    let diags = CSig::resolve(&pkg, &f).expect_err("must fail");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].code, "ffi.cdef.unknown_result");
  }
}
