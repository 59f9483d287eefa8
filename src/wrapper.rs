//! ラッパーパス。
//!
//! 生成物の後半、ホスト側から呼べる Python スタブ群を出力する。
//! 前置部(cdef ブロックの閉じ、dlopen、プリミティブ変換器、init 呼び出し)を
//! 一度だけ出した後、cdef パスと同じ辞書順でシンボルごとのスタブを出す。
//! 投影に失敗したシンボルは黙って飛ばす。診断は cdef パスが既に積んでいる。

use crate::mapping::{CRet, CSig};
use crate::printer::Printer;
use crate::symbol::{Func, Package};
use crate::synth;

const WRAPPER_PREAMBLE: &str = r#"""")

_dirname = os.path.dirname(os.path.abspath(__file__))
_lib = ffi.dlopen(os.path.join(_dirname, "_{pkg}.so"))

def cffi_cgopy_cnv_py2c_string(o):
    s = ffi.new("char[]", o)
    return _lib._cgopy_GoString(s, len(o))

def cffi_cgopy_cnv_c2py_string(c):
    s = _lib._cgopy_CString(c)
    o = bytes(ffi.buffer(s, c.n))
    _lib._cgopy_FreeCString(s)
    return o

def cffi_cgopy_cnv_py2c_int(o):
    return int(o)

def cffi_cgopy_cnv_c2py_int(c):
    return int(c)

def cffi_cgopy_cnv_py2c_uint(o):
    return int(o)

def cffi_cgopy_cnv_c2py_uint(c):
    return int(c)

def cffi_cgopy_cnv_py2c_float32(o):
    return float(o)

def cffi_cgopy_cnv_c2py_float32(c):
    return float(c)

def cffi_cgopy_cnv_py2c_float64(o):
    return float(o)

def cffi_cgopy_cnv_c2py_float64(c):
    return float(c)

_lib.cgo_pkg_{pkg}_init()

"#;

/// ラッパーブロックのエミッタ。前置部を出すまではスタブを出せない。
pub struct WrapperEmitter<'a> {
  pkg: &'a Package,
  out: &'a mut Printer,
}

impl<'a> WrapperEmitter<'a> {
  pub fn new(pkg: &'a Package, out: &'a mut Printer) -> Self {
    Self { pkg, out }
  }

  /// ラッパーブロック全体を固定順で出力する。
  pub fn emit(&mut self) {
    let pkg = self.pkg;
    self.preamble();

    for func in pkg.funcs() {
      self.stub(&func.name, func);
    }

    for item in pkg.consts() {
      let getter = synth::const_getter(item);
      self.stub(&format!("{}_get", item.name), &getter);
    }

    for var in pkg.vars() {
      let getter = synth::var_getter(&pkg.name, var);
      self.stub(&format!("{}_get", var.name), &getter);
      let setter = synth::var_setter(&pkg.name, var);
      self.stub(&format!("{}_set", var.name), &setter);
    }
  }

  fn preamble(&mut self) {
    let text = WRAPPER_PREAMBLE.replace("{pkg}", &self.pkg.name);
    self.out.push(&text);
  }

  /// 一シンボル分のスタブ。引数変換 → ネイティブ呼び出し →
  /// (エラー検査 →) 結果変換の順は崩さない。
  fn stub(&mut self, py_name: &str, func: &Func) {
    let csig = match CSig::resolve(self.pkg, func) {
      Ok(csig) => csig,
      Err(_) => return,
    };

    let params = csig
      .args
      .iter()
      .map(|arg| arg.name.as_str())
      .collect::<Vec<_>>()
      .join(", ");
    self.out.line(&format!("def {py_name}({params}):"));
    if !func.doc.is_empty() {
      self.out.line(&format!("    \"\"\"{}\"\"\"", func.doc));
    }

    for arg in &csig.args {
      if let Some(suffix) = arg.conv.suffix() {
        self.out.line(&format!(
          "    {0} = cffi_cgopy_cnv_py2c_{suffix}({0})",
          arg.name
        ));
      }
    }

    let call = format!("_lib.{}({params})", csig.id);
    match &csig.ret {
      CRet::Void => {
        self.out.line(&format!("    {call}"));
        self.out.line("    return");
      }
      CRet::Single { conv, .. } => {
        self.out.line(&format!("    cret = {call}"));
        match conv.suffix() {
          Some(suffix) => self
            .out
            .line(&format!("    return cffi_cgopy_cnv_c2py_{suffix}(cret)")),
          None => self.out.line("    return cret"),
        }
      }
      CRet::ErrorOnly => {
        self.out.line(&format!("    cret = {call}"));
        self.error_check("cret");
        self.out.line("    return");
      }
      CRet::Pair { conv, .. } => {
        self.out.line(&format!("    cret = {call}"));
        self.error_check("cret.r1");
        match conv.suffix() {
          Some(suffix) => self
            .out
            .line(&format!("    return cffi_cgopy_cnv_c2py_{suffix}(cret.r0)")),
          None => self.out.line("    return cret.r0"),
        }
      }
    }
    self.out.line("");
  }

  /// 末尾結果の is-nil 検査。診断文字列は NUL 終端で受け取り、
  /// 複製後にネイティブ側の領域を解放する。
  fn error_check(&mut self, expr: &str) {
    self
      .out
      .line(&format!("    if not _lib._cgopy_ErrorIsNil({expr}):"));
    self
      .out
      .line(&format!("        cerr = _lib._cgopy_ErrorString({expr})"));
    self
      .out
      .line("        pyerr = ffi.string(cerr).decode(\"utf-8\")");
    self.out.line("        _lib._cgopy_FreeCString(cerr)");
    self.out.line("        raise RuntimeError(pyerr)");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::symbol::{FuncSpec, PackageSpec, ParamSpec, VarSpec};

  fn emit(spec: &PackageSpec) -> String {
    let pkg = Package::from_spec(spec).expect("package");
    let mut out = Printer::new();
    WrapperEmitter::new(&pkg, &mut out).emit();
    out.finish()
  }

  fn base_spec(name: &str) -> PackageSpec {
    PackageSpec {
      name: name.to_string(),
      doc: String::new(),
      types: Vec::new(),
      functions: Vec::new(),
      consts: Vec::new(),
      vars: Vec::new(),
    }
  }

  #[test]
  fn preamble_opens_library_and_calls_init_once() {
    let text = emit(&base_spec("hello"));
    assert!(text.contains("_lib = ffi.dlopen(os.path.join(_dirname, \"_hello.so\"))"));
    assert_eq!(text.matches("_lib.cgo_pkg_hello_init()").count(), 1);
    let init_pos = text.find("cgo_pkg_hello_init").expect("init");
    let dlopen_pos = text.find("ffi.dlopen").expect("dlopen");
    assert!(dlopen_pos < init_pos);
  }

  #[test]
  fn string_converters_use_explicit_length() {
    let text = emit(&base_spec("hello"));
    assert!(text.contains("_lib._cgopy_GoString(s, len(o))"));
    assert!(text.contains("bytes(ffi.buffer(s, c.n))"));
    let free_pos = text.find("_lib._cgopy_FreeCString(s)").expect("free");
    let copy_pos = text.find("ffi.buffer(s, c.n)").expect("copy");
    assert!(copy_pos < free_pos);
  }

  #[test]
  fn simple_function_stub_converts_arguments_and_result() {
    let mut spec = base_spec("hello");
    spec.functions.push(FuncSpec {
      name: "Add".to_string(),
      doc: "adds two ints".to_string(),
      params: vec![
        ParamSpec {
          name: "a".to_string(),
          ty: "int".to_string(),
        },
        ParamSpec {
          name: "b".to_string(),
          ty: "int".to_string(),
        },
      ],
      results: vec![ParamSpec {
        name: "ret".to_string(),
        ty: "int".to_string(),
      }],
      error: false,
    });
    let text = emit(&spec);
    assert!(text.contains("def Add(a, b):"));
    assert!(text.contains("\"\"\"adds two ints\"\"\""));
    assert!(text.contains("    a = cffi_cgopy_cnv_py2c_int(a)"));
    assert!(text.contains("    cret = _lib.hello_Add(a, b)"));
    assert!(text.contains("    return cffi_cgopy_cnv_c2py_int(cret)"));
  }

  #[test]
  fn fallible_stub_checks_error_before_converting_result() {
    let mut spec = base_spec("hello");
    spec.functions.push(FuncSpec {
      name: "Div".to_string(),
      doc: String::new(),
      params: Vec::new(),
      results: vec![ParamSpec {
        name: "ret".to_string(),
        ty: "float64".to_string(),
      }],
      error: true,
    });
    let text = emit(&spec);
    let check_pos = text
      .find("if not _lib._cgopy_ErrorIsNil(cret.r1):")
      .expect("is-nil check");
    let ret_pos = text
      .find("return cffi_cgopy_cnv_c2py_float64(cret.r0)")
      .expect("result conversion");
    assert!(check_pos < ret_pos);
    assert!(text.contains("raise RuntimeError(pyerr)"));
    assert!(text.contains("_lib._cgopy_FreeCString(cerr)"));
  }

  #[test]
  fn var_gets_get_and_set_stubs() {
    let mut spec = base_spec("hello");
    spec.vars.push(VarSpec {
      name: "Counter".to_string(),
      ty: "int".to_string(),
      doc: String::new(),
    });
    let text = emit(&spec);
    assert!(text.contains("def Counter_get():"));
    assert!(text.contains("_lib.hello_Counter_get()"));
    assert!(text.contains("def Counter_set(arg):"));
    assert!(text.contains("_lib.hello_Counter_set(arg)"));
  }

  #[test]
  fn unresolvable_symbol_is_skipped_silently() {
    let mut spec = base_spec("hello");
    spec.vars.push(VarSpec {
      name: "Lookup".to_string(),
      ty: "map".to_string(),
      doc: String::new(),
    });
    let text = emit(&spec);
    // map はプリミティブ変換を持たないが GoMap として素通しできる。
    assert!(text.contains("def Lookup_get():"));
    spec.vars[0].ty = "Missing".to_string();
    let text = emit(&spec);
    assert!(!text.contains("def Lookup_get():"));
    assert!(!text.contains("def Lookup_set(arg):"));
    assert!(text.contains("_lib.cgo_pkg_hello_init()"));
  }
}
