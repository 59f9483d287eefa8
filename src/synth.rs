//! Var/Const 向けアクセサの合成。
//!
//! ネイティブ呼び出し規約には変数を直接公開する形が無いため、
//! getter/setter の関数を組み立てて代わりに公開する。合成は純粋で、
//! 元のシンボルを一切変更しない。cdef パスとラッパーパスは毎回
//! ここを呼び直し、合成値を共有しない。

use crate::symbol::{Const, Func, Param, Signature, Var};

/// 変数の getter を組み立てる。引数なし、結果は変数型の `ret` 一つ。
pub fn var_getter(pkg_name: &str, var: &Var) -> Func {
  Func {
    name: var.name.clone(),
    id: format!("{pkg_name}_{}_get", var.name),
    doc: format!("returns {pkg_name}.{}", var.name),
    sig: Signature {
      params: Vec::new(),
      results: vec![Param {
        name: "ret".to_string(),
        ty: var.ty.clone(),
      }],
      fallible: false,
    },
    ret: Some(var.ty.clone()),
  }
}

/// 変数の setter を組み立てる。変数型の引数 `arg` 一つ、結果なし。
pub fn var_setter(pkg_name: &str, var: &Var) -> Func {
  Func {
    name: var.name.clone(),
    id: format!("{pkg_name}_{}_set", var.name),
    doc: format!("sets {pkg_name}.{}", var.name),
    sig: Signature {
      params: vec![Param {
        name: "arg".to_string(),
        ty: var.ty.clone(),
      }],
      results: Vec::new(),
      fallible: false,
    },
    ret: None,
  }
}

/// 定数は構築時に関連付いた getter をそのまま使う。setter は合成しない。
pub fn const_getter(item: &Const) -> Func {
  item.getter.clone()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::symbol::TypeRef;

  fn sample_var() -> Var {
    Var {
      name: "Counter".to_string(),
      doc: "a counter".to_string(),
      ty: TypeRef::Int,
    }
  }

  #[test]
  fn getter_shape_matches_contract() {
    let var = sample_var();
    let getter = var_getter("hello", &var);
    assert_eq!(getter.id, "hello_Counter_get");
    assert_eq!(getter.doc, "returns hello.Counter");
    assert!(getter.sig.params.is_empty());
    assert_eq!(getter.sig.results.len(), 1);
    assert_eq!(getter.sig.results[0].name, "ret");
    assert_eq!(getter.sig.results[0].ty, TypeRef::Int);
    assert_eq!(getter.ret, Some(TypeRef::Int));
    assert!(!getter.sig.fallible);
  }

  #[test]
  fn setter_shape_matches_contract() {
    let var = sample_var();
    let setter = var_setter("hello", &var);
    assert_eq!(setter.id, "hello_Counter_set");
    assert_eq!(setter.doc, "sets hello.Counter");
    assert_eq!(setter.sig.params.len(), 1);
    assert_eq!(setter.sig.params[0].name, "arg");
    assert_eq!(setter.sig.params[0].ty, TypeRef::Int);
    assert!(setter.sig.results.is_empty());
    assert_eq!(setter.ret, None);
  }

  #[test]
  fn synthesis_is_repeatable() {
    let var = sample_var();
    assert_eq!(var_getter("hello", &var), var_getter("hello", &var));
    assert_eq!(var_setter("hello", &var), var_setter("hello", &var));
  }

  #[test]
  fn synthesis_does_not_touch_the_var() {
    let var = sample_var();
    let before = var.clone();
    let _ = var_getter("hello", &var);
    let _ = var_setter("hello", &var);
    assert_eq!(var, before);
  }

  #[test]
  fn const_getter_is_reused_unchanged() {
    let item = Const::new("hello", "Version", TypeRef::String, "");
    let first = const_getter(&item);
    let second = const_getter(&item);
    assert_eq!(first, item.getter);
    assert_eq!(first, second);
  }
}
