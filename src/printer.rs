//! 生成物を受け取る追記専用バッファ。
//! エミッタは常にここへ書き込み、呼び出し側へ文字列を直接返さない。

/// 追記専用のテキストバッファ。cdef ブロック → ラッパーブロックの順で
/// 逐次書き込まれ、途中の差し込みは許さない。
#[derive(Debug, Default)]
pub struct Printer {
  buf: String,
}

impl Printer {
  pub fn new() -> Self {
    Self { buf: String::new() }
  }

  /// 文字列をそのまま追記する。
  pub fn push(&mut self, text: &str) {
    self.buf.push_str(text);
  }

  /// 一行追記する。改行は常にこちらが付与する。
  pub fn line(&mut self, text: &str) {
    self.buf.push_str(text);
    self.buf.push('\n');
  }

  pub fn is_empty(&self) -> bool {
    self.buf.is_empty()
  }

  /// バッファの所有権ごと生成物を取り出す。
  pub fn finish(self) -> String {
    self.buf
  }
}
