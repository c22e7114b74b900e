//! 内容归一化（去混淆）
//!
//! 匹配前按固定顺序对文件字节做四步改写：
//! 1. 删除相邻的“引号-点-引号”（拼接串）：`'ev'.'al'` → `'eval'`
//! 2. 删除块注释 `/* ... */`
//! 3. 解码十六进制转义 `\xHH`
//! 4. 解码八进制转义 `\NNN`
//!
//! 先剥离、后解码：解码出的字节不会再被前两步改写。
//! 解码失败（格式不合法的转义）一律替换为空，不报错。
use std::borrow::Cow;
use std::fmt;

use regex::bytes::{Captures, Regex};

/// 单步动作
#[derive(Clone, Copy)]
enum Action {
    /// 删除匹配片段
    Strip,
    /// 用解码结果替换匹配片段；解码失败替换为空
    Decode(fn(&[u8]) -> Option<u8>),
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Strip => f.write_str("Strip"),
            Action::Decode(_) => f.write_str("Decode"),
        }
    }
}

#[derive(Debug, Clone)]
struct Step {
    matcher: Regex,
    action: Action,
}

impl Step {
    fn apply<'a>(&self, content: &'a [u8]) -> Cow<'a, [u8]> {
        match self.action {
            Action::Strip => self.matcher.replace_all(content, &b""[..]),
            Action::Decode(decode) => self.matcher.replace_all(content, |caps: &Captures<'_>| -> Vec<u8> {
                decode(&caps[0]).map(|b| vec![b]).unwrap_or_default()
            }),
        }
    }
}

/// 归一化流水线：构建一次，之后只读，可跨线程共享
#[derive(Debug, Clone)]
pub struct Normalizer {
    steps: Vec<Step>,
}

impl Normalizer {
    pub fn new() -> Result<Self, regex::Error> {
        let table: [(&str, Action); 4] = [
            (r#"(?si-u:['"]\s*?\.\s*?['"])"#, Action::Strip),
            (r"(?s-u:/\*.*?\*/)", Action::Strip),
            (r"(?i-u:\\x[0-9a-f]{1,2})", Action::Decode(decode_hex_escape)),
            (r"(?-u:\\[0-9]{1,3})", Action::Decode(decode_octal_escape)),
        ];
        let steps = table
            .into_iter()
            .map(|(pat, action)| Regex::new(pat).map(|matcher| Step { matcher, action }))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { steps })
    }

    /// 对一段内容执行全部步骤
    pub fn normalize(&self, content: &[u8]) -> Vec<u8> {
        let mut buf = content.to_vec();
        for step in &self.steps {
            // 未命中时 replace_all 返回借用，无需替换缓冲区
            let next = match step.apply(&buf) {
                Cow::Owned(next) => Some(next),
                Cow::Borrowed(_) => None,
            };
            if let Some(next) = next {
                buf = next;
            }
        }
        buf
    }
}

/// `\xHH`：只接受小写 `x` 加恰好两位十六进制
fn decode_hex_escape(esc: &[u8]) -> Option<u8> {
    match esc {
        [b'\\', b'x', hi, lo] => Some((hex_val(*hi)? << 4) | hex_val(*lo)?),
        _ => None,
    }
}

/// `\NNN`：只接受恰好三位八进制且值不超过 0o377
fn decode_octal_escape(esc: &[u8]) -> Option<u8> {
    match esc {
        [b'\\', a, b, c] => {
            let v = (u16::from(oct_val(*a)?) << 6) | (u16::from(oct_val(*b)?) << 3) | u16::from(oct_val(*c)?);
            u8::try_from(v).ok()
        }
        _ => None,
    }
}

fn hex_val(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

fn oct_val(b: u8) -> Option<u8> {
    (b as char).to_digit(8).map(|d| d as u8)
}
