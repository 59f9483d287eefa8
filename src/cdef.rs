//! cdef パス。
//!
//! 生成物の前半、`ffi.cdef` に入るネイティブ宣言ブロックを出力する。
//! 型宣言(スライス/配列)→ 関数 → 定数 getter → 変数 get/set の順で、
//! ラッパーパスと同じ辞書順を観測する。投影できない型は診断に積み、
//! 残りのシンボルの出力は続行する。

use crate::mapping::{CRet, CSig};
use crate::printer::Printer;
use crate::symbol::{Func, Package, Symbol, TypeDef, TypeRef};
use crate::{synth, DiagnosticEntry};

const CDEF_PREAMBLE: &str = r#""""{doc}"""
import os
import cffi as _cffi_backend

ffi = _cffi_backend.FFI()
ffi.cdef("""
typedef signed char GoInt8;
typedef unsigned char GoUint8;
typedef short GoInt16;
typedef unsigned short GoUint16;
typedef int GoInt32;
typedef unsigned int GoUint32;
typedef long long GoInt64;
typedef unsigned long long GoUint64;
typedef GoInt64 GoInt;
typedef GoUint64 GoUint;
typedef size_t GoUintptr;
typedef float GoFloat32;
typedef double GoFloat64;
typedef struct { const char *p; GoInt n; } GoString;
typedef void *GoMap;
typedef void *GoChan;
typedef struct { void *t; void *v; } GoInterface;
typedef struct { void *data; GoInt len; GoInt cap; } GoSlice;

extern GoString _cgopy_GoString(char* p0, GoInt p1);
extern char* _cgopy_CString(GoString p0);
extern void _cgopy_FreeCString(char* p0);
extern GoUint8 _cgopy_ErrorIsNil(GoInterface p0);
extern char* _cgopy_ErrorString(GoInterface p0);

extern void cgo_pkg_{pkg}_init();
"#;

/// cdef ブロックのエミッタ。追記先とパッケージへの参照のみを持つ。
pub struct CdefEmitter<'a> {
  pkg: &'a Package,
  out: &'a mut Printer,
  diagnostics: &'a mut Vec<DiagnosticEntry>,
}

impl<'a> CdefEmitter<'a> {
  pub fn new(
    pkg: &'a Package,
    out: &'a mut Printer,
    diagnostics: &'a mut Vec<DiagnosticEntry>,
  ) -> Self {
    Self {
      pkg,
      out,
      diagnostics,
    }
  }

  /// cdef ブロック全体を固定順で出力する。
  pub fn emit(&mut self) {
    let pkg = self.pkg;
    self.preamble();

    // 型宣言は関数群より先に出す。後続の extern が参照するため。
    for name in pkg.table.names() {
      if let Ok(Symbol::Type(def)) = pkg.table.sym(name) {
        self.type_decl(def);
      }
    }

    for func in pkg.funcs() {
      self.func_decl(func);
    }

    for item in pkg.consts() {
      self.func_decl(&synth::const_getter(item));
    }

    for var in pkg.vars() {
      self.func_decl(&synth::var_getter(&pkg.name, var));
      self.func_decl(&synth::var_setter(&pkg.name, var));
    }
  }

  fn preamble(&mut self) {
    let text = CDEF_PREAMBLE
      .replace("{doc}", &self.pkg.doc)
      .replace("{pkg}", &self.pkg.name);
    self.out.push(&text);
  }

  fn type_decl(&mut self, def: &TypeDef) {
    match def.ty {
      TypeRef::Slice(_) | TypeRef::Array(_, _) => {
        self
          .out
          .line(&format!("typedef GoSlice {}_{};", self.pkg.name, def.name));
      }
      _ => {
        self.diagnostics.push(DiagnosticEntry {
          code: "ffi.cdef.unknown_type_decl".to_string(),
          symbol: Some(def.name.clone()),
          c_type: Some(def.ty.to_string()),
          reason: Some("unsupported_type_decl".to_string()),
          hint: Some("型宣言はスライス/配列のみ対応です".to_string()),
        });
      }
    }
  }

  fn func_decl(&mut self, func: &Func) {
    let csig = match CSig::resolve(self.pkg, func) {
      Ok(csig) => csig,
      Err(mut diags) => {
        self.diagnostics.append(&mut diags);
        return;
      }
    };

    if let Some(struct_name) = csig.ret_struct_name() {
      if let CRet::Pair { ref c_type, .. } = csig.ret {
        self.out.line(&format!(
          "typedef struct {{ {c_type} r0; GoInterface r1; }} {struct_name};"
        ));
      }
    }

    let ret_name = match &csig.ret {
      CRet::Void => "void".to_string(),
      CRet::Single { c_type, .. } => c_type.clone(),
      CRet::ErrorOnly => "GoInterface".to_string(),
      CRet::Pair { .. } => csig.ret_struct_name().unwrap_or_default(),
    };
    let args = csig
      .args
      .iter()
      .enumerate()
      .map(|(i, arg)| format!("{} p{i}", arg.c_type))
      .collect::<Vec<_>>()
      .join(", ");
    self
      .out
      .line(&format!("extern {ret_name} {}({args});", csig.id));
  }
}
