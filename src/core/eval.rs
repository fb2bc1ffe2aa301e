// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! String-driven infix expression evaluation.
//!
//! Expressions arrive as raw operand text. Evaluation is a rewrite
//! pipeline over that text: registered substitutions splice in symbol
//! values, number literals are normalized to decimal, function calls
//! and unary operators are rewritten to plain binary arithmetic, and
//! the remaining infix string is shunted to postfix and computed on an
//! `f64` stack. Multi-character operators are folded to single
//! non-ASCII sentinels up front so the shunting loop can work on chars.
//!
//! Results for symbol-free expressions are cached under their original
//! text; anything a substitution could touch is recomputed every time,
//! since symbol values move between passes.

use std::collections::HashMap;

use regex::Regex;

use crate::core::eval_functions::{default_functions, FunctionDef};
use crate::core::fault::Fault;

/// Operator alphabet in precedence order, lowest first. The index in
/// this table is the operator's binding strength; the shunting loop
/// pops while the stacked operator's index is >= the incoming one,
/// which makes every operator left-associative.
const OPERATORS: [char; 19] = [
    '∨', '∧', '<', '≤', '≠', '≡', '≥', '>', '≪', '≫', '-', '+', '^', '|', '&', '%', '/', '*', '↑',
];

/// Characters that may begin a unary operation.
const UNARY_OPS: [char; 8] = ['!', '+', '-', '~', '^', '&', '<', '>'];

/// Callback that supplies replacement text for a matched token.
/// `None` means the token should exist but has no value.
pub type Resolver = Box<dyn FnMut(&str) -> Option<String>>;

/// Boundary predicate deciding whether a regex match is really a
/// symbol occurrence. Receives the characters immediately before and
/// after the match, if any.
pub type BoundaryGuard = fn(Option<char>, Option<char>) -> bool;

struct Substitution {
    pattern: Regex,
    guard: Option<BoundaryGuard>,
    resolver: Resolver,
}

/// Construction-time options for [`Evaluator`].
pub struct EvaluatorConfig {
    /// Regex patterns whose first capture group holds hex digits.
    pub hex_patterns: Vec<String>,
    /// Characters standing for a set/clear bit in `%`-style binary
    /// literals, alongside plain `1` and `0`.
    pub binary_set: char,
    pub binary_clear: char,
    /// Callable function table.
    pub functions: HashMap<String, FunctionDef>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig {
            hex_patterns: vec![String::from("0x([a-fA-F0-9]+)")],
            binary_set: '#',
            binary_clear: '.',
            functions: default_functions(),
        }
    }
}

pub struct Evaluator {
    hex_regexes: Vec<Regex>,
    substitutions: Vec<Substitution>,
    functions: HashMap<String, FunctionDef>,
    function_call: Regex,
    binary_set: char,
    binary_clear: char,
    cache: HashMap<String, f64>,
}

impl Evaluator {
    pub fn new(config: EvaluatorConfig) -> Result<Self, Fault> {
        let mut hex_regexes = Vec::with_capacity(config.hex_patterns.len());
        for pattern in &config.hex_patterns {
            hex_regexes.push(compile(pattern)?);
        }
        Ok(Evaluator {
            hex_regexes,
            substitutions: Vec::new(),
            functions: config.functions,
            function_call: compile(r"([a-zA-Z_][a-zA-Z0-9_]*)\(")?,
            binary_set: config.binary_set,
            binary_clear: config.binary_clear,
            cache: HashMap::new(),
        })
    }

    /// Register another hex literal notation, e.g. `\$([a-fA-F0-9]+)`.
    pub fn add_hex_format(&mut self, pattern: &str) -> Result<(), Fault> {
        self.hex_regexes.push(compile(pattern)?);
        Ok(())
    }

    /// Register a token substitution. Rules run in registration order
    /// on every evaluation. A match only substitutes when the guard
    /// (if any) accepts the characters around it; the resolver's text
    /// is spliced in verbatim, so values should be plain decimal.
    pub fn register_substitution(
        &mut self,
        pattern: &str,
        guard: Option<BoundaryGuard>,
        resolver: Resolver,
    ) -> Result<(), Fault> {
        self.substitutions.push(Substitution {
            pattern: compile(pattern)?,
            guard,
            resolver,
        });
        Ok(())
    }

    /// Evaluate to an integer, truncating any fractional result.
    pub fn evaluate(&mut self, expression: &str) -> Result<i64, Fault> {
        Ok(self.eval_internal(expression)? as i64)
    }

    /// Evaluate and range-check the result.
    pub fn evaluate_range(&mut self, expression: &str, min: i64, max: i64) -> Result<i64, Fault> {
        let result = self.eval_internal(expression)?;
        if !result.is_finite() {
            return Err(Fault::DivideByZero(expression.to_string()));
        }
        if result < min as f64 || result > max as f64 {
            return Err(Fault::NumericOverflow { value: result as i64, min, max });
        }
        Ok(result as i64)
    }

    /// A condition is true exactly when it evaluates to 1.
    pub fn evaluate_condition(&mut self, expression: &str) -> Result<bool, Fault> {
        Ok(self.evaluate(expression)? == 1)
    }

    fn eval_internal(&mut self, raw: &str) -> Result<f64, Fault> {
        if raw.is_empty() {
            return Err(Fault::MalformedExpression(raw.to_string()));
        }
        if let Some(&cached) = self.cache.get(raw) {
            return Ok(cached);
        }

        let mut expr = fold_multichar_operators(raw);
        expr = self.replace_hex_literals(expr)?;
        expr = self.replace_binary_literals(&expr);

        // Only text no substitution can touch is safe to cache; symbol
        // values change between passes.
        let cacheable = !self.contains_symbols(&expr);

        expr = self.apply_substitutions(expr)?;
        expr = self.expand_functions(expr)?;
        expr = self.rewrite_unaries(expr)?;
        expr = expr.replace("**", "↑");

        let outputs = shunt(&expr, raw)?;
        if outputs.is_empty() {
            return Err(Fault::MalformedExpression(raw.to_string()));
        }
        let result = calculate(&outputs, raw)?;
        if cacheable {
            self.cache.insert(raw.to_string(), result);
        }
        Ok(result)
    }

    fn replace_hex_literals(&self, mut expr: String) -> Result<String, Fault> {
        for regex in &self.hex_regexes {
            if !regex.is_match(&expr) {
                continue;
            }
            let mut out = String::with_capacity(expr.len());
            let mut last = 0;
            for caps in regex.captures_iter(&expr) {
                let whole = match caps.get(0) {
                    Some(m) => m,
                    None => continue,
                };
                let digits = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                let value = i64::from_str_radix(digits, 16)
                    .map_err(|_| Fault::MalformedExpression(expr.clone()))?;
                out.push_str(&expr[last..whole.start()]);
                out.push_str(&value.to_string());
                last = whole.end();
            }
            out.push_str(&expr[last..]);
            expr = out;
        }
        Ok(expr)
    }

    // A '%' introduces a binary literal only when the preceding
    // character could not itself belong to one; otherwise it stays a
    // modulo operator. So `%0101` is five but `1%0101` is a modulo.
    fn replace_binary_literals(&self, expr: &str) -> String {
        let chars: Vec<char> = expr.chars().collect();
        let mut out = String::with_capacity(expr.len());
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c != '%' {
                out.push(c);
                i += 1;
                continue;
            }
            let boundary = i == 0
                || !matches!(chars[i - 1], '0' | '1')
                    && chars[i - 1] != self.binary_set
                    && chars[i - 1] != self.binary_clear;
            let digit_run = |pred: &dyn Fn(char) -> bool| {
                chars[i + 1..].iter().take_while(|&&ch| pred(ch)).count()
            };
            if boundary && i + 1 < chars.len() {
                let next = chars[i + 1];
                let (len, bits): (usize, String) = if next == '0' || next == '1' {
                    let len = digit_run(&|ch| ch == '0' || ch == '1');
                    (len, chars[i + 1..i + 1 + len].iter().collect())
                } else if next == self.binary_set || next == self.binary_clear {
                    let len = digit_run(&|ch| ch == self.binary_set || ch == self.binary_clear);
                    let bits = chars[i + 1..i + 1 + len]
                        .iter()
                        .map(|&ch| if ch == self.binary_set { '1' } else { '0' })
                        .collect();
                    (len, bits)
                } else {
                    (0, String::new())
                };
                if len > 0 {
                    if let Ok(value) = i64::from_str_radix(&bits, 2) {
                        out.push_str(&value.to_string());
                        i += 1 + len;
                        continue;
                    }
                }
            }
            out.push('%');
            i += 1;
        }
        out
    }

    /// Whether any registered substitution would fire on the text.
    /// Such expressions are pass-dependent and never cached.
    pub fn contains_symbols(&self, expr: &str) -> bool {
        self.substitutions.iter().any(|sub| {
            sub.pattern.find_iter(expr).any(|m| match sub.guard {
                None => true,
                Some(guard) => guard(
                    expr[..m.start()].chars().next_back(),
                    expr[m.end()..].chars().next(),
                ),
            })
        })
    }

    fn apply_substitutions(&mut self, expr: String) -> Result<String, Fault> {
        let mut expr = expr;
        for sub in &mut self.substitutions {
            let matches: Vec<(usize, usize)> = sub
                .pattern
                .find_iter(&expr)
                .map(|m| (m.start(), m.end()))
                .collect();
            if matches.is_empty() {
                continue;
            }
            let mut out = String::with_capacity(expr.len());
            let mut last = 0;
            for (start, end) in matches {
                let passes = match sub.guard {
                    None => true,
                    Some(guard) => guard(
                        expr[..start].chars().next_back(),
                        expr[end..].chars().next(),
                    ),
                };
                out.push_str(&expr[last..start]);
                if passes {
                    let token = &expr[start..end];
                    let value = (sub.resolver)(token)
                        .ok_or_else(|| Fault::UndefinedSymbol(token.to_string()))?;
                    out.push_str(&value);
                } else {
                    out.push_str(&expr[start..end]);
                }
                last = end;
            }
            out.push_str(&expr[last..]);
            expr = out;
        }
        Ok(expr)
    }

    // Rewrites the leftmost innermost call until none remain. Each
    // call's arguments go through the full pipeline, so nesting and
    // symbols inside argument lists work for free.
    fn expand_functions(&mut self, expr: String) -> Result<String, Fault> {
        let mut expr = expr;
        loop {
            let (name, open) = match self.function_call.captures(&expr) {
                Some(caps) => {
                    let name = caps
                        .get(1)
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default();
                    let open = caps.get(0).map(|m| m.end() - 1).unwrap_or(0);
                    (name, open)
                }
                None => return Ok(expr),
            };
            let enclosure = first_paren_enclosure(&expr[open..])
                .ok_or_else(|| Fault::MalformedExpression(expr.clone()))?
                .to_string();
            let def = *self
                .functions
                .get(&name)
                .ok_or_else(|| Fault::MalformedExpression(expr.clone()))?;
            let inner = self.expand_functions(enclosure[1..enclosure.len() - 1].to_string())?;
            let args: Vec<&str> = inner.split(',').filter(|s| !s.is_empty()).collect();
            if args.len() < def.min_args || args.len() > def.max_args {
                return Err(Fault::MalformedExpression(expr));
            }
            let mut values = Vec::with_capacity(args.len());
            for arg in &args {
                values.push(self.eval_internal(arg)?);
            }
            let result = (def.apply)(&values);
            let call = format!("{name}{enclosure}");
            expr = expr.replacen(&call, &result.to_string(), 1);
        }
    }

    // Unary operators are rewritten to binary arithmetic so the
    // shunting loop only ever sees binary operators:
    //   <v  ->  ((v)%256)          >v  ->  (((v)/256)%256)
    //   ^v  ->  (((v)/65536)%256)  &v  ->  ((v)%65536)
    //   -v  ->  (0-v)              +v  ->  v
    // `!v` and `~v` need the operand's value, so they recurse.
    fn rewrite_unaries(&mut self, expr: String) -> Result<String, Fault> {
        let mut expr = strip_space_before_unary(&expr);
        loop {
            let (pos, op, operand) = match find_unary(&expr) {
                Some(hit) => hit,
                None => return Ok(expr),
            };
            let replacement = match op {
                '^' => format!("((({operand})/65536)%256)"),
                '>' => format!("((({operand})/256)%256)"),
                '&' => format!("(({operand})%65536)"),
                '<' => format!("(({operand})%256)"),
                '-' => format!("(0-{operand})"),
                '+' => operand.clone(),
                '!' => {
                    if self.eval_internal(&operand)? as i64 == 0 {
                        String::from("1")
                    } else {
                        String::from("0")
                    }
                }
                _ => {
                    let complement = !(self.eval_internal(&operand)? as i64);
                    if complement < 0 {
                        format!("(0{complement})")
                    } else {
                        complement.to_string()
                    }
                }
            };
            let tail = pos + op.len_utf8() + operand.len();
            expr = format!("{}{}{}", &expr[..pos], replacement, &expr[tail..]);
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, Fault> {
    Regex::new(pattern).map_err(|_| Fault::MalformedExpression(pattern.to_string()))
}

fn fold_multichar_operators(expr: &str) -> String {
    expr.replace("<<", "≪")
        .replace(">>", "≫")
        .replace("==", "≡")
        .replace("&&", "∧")
        .replace("||", "∨")
        .replace("<=", "≤")
        .replace("!=", "≠")
        .replace(">=", "≥")
}

fn precedence(c: char) -> Option<usize> {
    OPERATORS.iter().position(|&op| op == c)
}

fn is_math_symbol(c: char) -> bool {
    precedence(c).is_some() || c == '(' || c == ')'
}

/// Balanced parenthesized prefix of `s`, which must start with `(`.
fn first_paren_enclosure(s: &str) -> Option<&str> {
    let mut depth = 0usize;
    for (pos, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&s[..pos + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

// Drop whitespace runs that sit directly before a unary candidate, so
// `LDA < label` reads the same as `LDA <label`.
fn strip_space_before_unary(expr: &str) -> String {
    let chars: Vec<char> = expr.chars().collect();
    let mut out = String::with_capacity(expr.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_whitespace() {
            let mut j = i;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && UNARY_OPS.contains(&chars[j]) {
                i = j;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

// A unary candidate must not follow a digit, '.', ')' or another
// already-rewritten extraction, and must be trailed by a parenthesized
// group or a digit run. Anything else is left for the binary parser.
fn find_unary(expr: &str) -> Option<(usize, char, String)> {
    let mut prev: Option<char> = None;
    for (pos, c) in expr.char_indices() {
        if UNARY_OPS.contains(&c) {
            let blocked = prev
                .map(|p| p.is_ascii_digit() || matches!(p, '.' | ')' | '<' | '>'))
                .unwrap_or(false);
            if !blocked {
                if let Some(operand) = unary_operand(&expr[pos + c.len_utf8()..]) {
                    return Some((pos, c, operand));
                }
            }
        }
        prev = Some(c);
    }
    None
}

fn unary_operand(rest: &str) -> Option<String> {
    if rest.starts_with('(') {
        let enclosure = first_paren_enclosure(rest)?;
        if enclosure.len() > 2 {
            return Some(enclosure.to_string());
        }
        return None;
    }
    let end = rest
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(rest.len());
    if end == 0 {
        None
    } else {
        Some(rest[..end].to_string())
    }
}

/// Shunting-yard conversion of a sanitized infix string to postfix
/// tokens. Numbers come out as text, operators as single-char strings.
fn shunt(expr: &str, raw: &str) -> Result<Vec<String>, Fault> {
    let malformed = || Fault::MalformedExpression(raw.to_string());
    let chars: Vec<char> = expr.chars().collect();
    let mut outputs: Vec<String> = Vec::new();
    let mut stack: Vec<char> = Vec::new();
    let mut number = String::new();
    let mut last_was_ws = false;

    for i in 0..chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            last_was_ws = true;
            continue;
        }
        if c.is_ascii_digit() || c == '.' {
            // two numbers split only by whitespace, e.g. "55 23"
            if !number.is_empty() && last_was_ws {
                return Err(malformed());
            }
            last_was_ws = false;
            number.push(c);
        } else if !is_math_symbol(c) {
            return Err(malformed());
        }
        if (is_math_symbol(c) || i == chars.len() - 1) && !number.is_empty() {
            outputs.push(std::mem::take(&mut number));
        }

        if let Some(prec) = precedence(c) {
            // an operator may not start the expression or directly
            // follow another operator
            if i == 0 || precedence(chars[i - 1]).is_some() {
                return Err(malformed());
            }
            while let Some(&top) = stack.last() {
                match precedence(top) {
                    Some(top_prec) if top_prec >= prec => {
                        stack.pop();
                        outputs.push(top.to_string());
                    }
                    _ => break,
                }
            }
            stack.push(c);
        } else if c == '(' {
            if i > 0
                && !chars[i - 1].is_whitespace()
                && precedence(chars[i - 1]).is_none()
                && chars[i - 1] != '('
            {
                return Err(malformed());
            }
            stack.push(c);
        } else if c == ')' {
            if stack.is_empty() || precedence(chars[i - 1]).is_some() {
                return Err(malformed());
            }
            loop {
                match stack.pop() {
                    Some('(') => break,
                    Some(op) => outputs.push(op.to_string()),
                    None => return Err(malformed()),
                }
            }
        }
    }
    while let Some(op) = stack.pop() {
        if op == '(' {
            return Err(malformed());
        }
        outputs.push(op.to_string());
    }
    Ok(outputs)
}

/// Fold a postfix token stream on an `f64` stack. Bitwise operators,
/// modulo and the integer comparisons truncate their operands; shifts
/// work in 32 bits with the count masked, matching the customary
/// assembler value domain.
fn calculate(outputs: &[String], raw: &str) -> Result<f64, Fault> {
    let malformed = || Fault::MalformedExpression(raw.to_string());
    let mut stack: Vec<f64> = Vec::new();
    let mut need_operator = false;

    for token in outputs {
        if let Ok(number) = token.parse::<f64>() {
            need_operator = !stack.is_empty();
            stack.push(number);
            continue;
        }
        need_operator = false;
        let right = stack.pop().ok_or_else(malformed)?;
        let left = stack.pop().ok_or_else(malformed)?;
        let value = match token.as_str() {
            "+" => left + right,
            "-" => left - right,
            "*" => left * right,
            "/" => {
                if right == 0.0 {
                    return Err(Fault::DivideByZero(raw.to_string()));
                }
                left / right
            }
            "%" => {
                if right as i64 == 0 {
                    return Err(Fault::DivideByZero(raw.to_string()));
                }
                (left as i64 % right as i64) as f64
            }
            "&" => (left as i64 & right as i64) as f64,
            "|" => (left as i64 | right as i64) as f64,
            "^" => (left as i64 ^ right as i64) as f64,
            "≪" => (left as i32).wrapping_shl(right as i64 as u32) as f64,
            "≫" => (left as i32).wrapping_shr(right as i64 as u32) as f64,
            "↑" => left.powf(right),
            ">" => (left > right) as i64 as f64,
            "≥" => (left >= right) as i64 as f64,
            "≡" => (left as i64 == right as i64) as i64 as f64,
            "≠" => (left as i64 != right as i64) as i64 as f64,
            "≤" => (left <= right) as i64 as f64,
            "<" => (left < right) as i64 as f64,
            // && and || deliberately compute on the operand bits, so
            // the truth value of `2 && 1` is the bitwise AND, not 1
            "∧" => (left as i32 & right as i32) as f64,
            "∨" => (left as i32 | right as i32) as f64,
            _ => return Err(malformed()),
        };
        stack.push(value);
    }
    if need_operator {
        return Err(malformed());
    }
    stack.pop().ok_or_else(malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn evaluator() -> Evaluator {
        let mut eval = Evaluator::new(EvaluatorConfig::default()).unwrap();
        eval.add_hex_format(r"\$([a-fA-F0-9]+)").unwrap();
        eval
    }

    #[test]
    fn precedence_and_grouping() {
        let mut eval = evaluator();
        assert_eq!(eval.evaluate("2+3*4").unwrap(), 14);
        assert_eq!(eval.evaluate("(2+3)*4").unwrap(), 20);
        assert_eq!(eval.evaluate("2*3+4<<1").unwrap(), 20);
        assert_eq!(eval.evaluate("1|2&3").unwrap(), 3);
        assert_eq!(eval.evaluate("10-4-3").unwrap(), 3);
    }

    #[test]
    fn hex_and_binary_literals() {
        let mut eval = evaluator();
        assert_eq!(eval.evaluate("0xff").unwrap(), 255);
        assert_eq!(eval.evaluate("$1234").unwrap(), 0x1234);
        assert_eq!(eval.evaluate("%0101").unwrap(), 5);
        assert_eq!(eval.evaluate("%#.#.").unwrap(), 10);
    }

    #[test]
    fn percent_after_binary_digit_is_modulo() {
        let mut eval = evaluator();
        // the prefix rule: '1' before '%' makes "0101" a decimal 101
        assert_eq!(eval.evaluate("1%0101").unwrap(), 1);
        assert_eq!(eval.evaluate("7%2").unwrap(), 1);
        // any other predecessor leaves '%' free to open a literal, so
        // the '0' is eaten and the digits concatenate
        assert_eq!(eval.evaluate("5%0").unwrap(), 50);
    }

    #[test]
    fn byte_extraction_unaries() {
        let mut eval = evaluator();
        assert_eq!(eval.evaluate("<$1234").unwrap(), 0x34);
        assert_eq!(eval.evaluate(">$1234").unwrap(), 0x12);
        assert_eq!(eval.evaluate("^$123456").unwrap(), 0x12);
        assert_eq!(eval.evaluate("&$123456").unwrap(), 0x3456);
        assert_eq!(eval.evaluate("<($1233+1)").unwrap(), 0x34);
    }

    #[test]
    fn negation_and_complement() {
        let mut eval = evaluator();
        assert_eq!(eval.evaluate("-5").unwrap(), -5);
        assert_eq!(eval.evaluate("2*-3").unwrap(), -6);
        assert_eq!(eval.evaluate("~0").unwrap(), -1);
        assert_eq!(eval.evaluate("~%1111").unwrap(), -16);
        assert_eq!(eval.evaluate("!0").unwrap(), 1);
        assert_eq!(eval.evaluate("!(5>3)").unwrap(), 0);
    }

    #[test]
    fn power_operator() {
        let mut eval = evaluator();
        assert_eq!(eval.evaluate("5**2").unwrap(), 25);
        assert_eq!(eval.evaluate("2**3**2").unwrap(), 64);
    }

    #[test]
    fn comparisons_and_conditions() {
        let mut eval = evaluator();
        assert!(eval.evaluate_condition("3 > 2").unwrap());
        assert!(eval.evaluate_condition("5 == 5").unwrap());
        assert!(eval.evaluate_condition("4 != 5").unwrap());
        assert!(!eval.evaluate_condition("1 > 2").unwrap());
        assert!(eval.evaluate_condition("1 <= 1 && 2 >= 2").unwrap());
    }

    #[test]
    fn logical_operators_use_operand_bits() {
        let mut eval = evaluator();
        assert_eq!(eval.evaluate("2&&1").unwrap(), 0);
        assert_eq!(eval.evaluate("2||1").unwrap(), 3);
    }

    #[test]
    fn division_faults() {
        let mut eval = evaluator();
        assert!(matches!(eval.evaluate("5/0"), Err(Fault::DivideByZero(_))));
        assert!(matches!(eval.evaluate("5%(0)"), Err(Fault::DivideByZero(_))));
        assert!(matches!(eval.evaluate("5 % 0"), Err(Fault::DivideByZero(_))));
        assert_eq!(eval.evaluate("7/2").unwrap(), 3);
    }

    #[test]
    fn range_checks() {
        let mut eval = evaluator();
        assert_eq!(eval.evaluate_range("255", 0, 255).unwrap(), 255);
        assert!(matches!(
            eval.evaluate_range("256", 0, 255),
            Err(Fault::NumericOverflow { value: 256, min: 0, max: 255 })
        ));
        assert!(matches!(
            eval.evaluate_range("0-1", 0, 255),
            Err(Fault::NumericOverflow { .. })
        ));
    }

    #[test]
    fn functions_expand_inline() {
        let mut eval = evaluator();
        assert_eq!(eval.evaluate("abs(-5)").unwrap(), 5);
        assert_eq!(eval.evaluate("pow(2,8)").unwrap(), 256);
        assert_eq!(eval.evaluate("sqrt(16)+1").unwrap(), 5);
        assert_eq!(eval.evaluate("pow(2,abs(-3))").unwrap(), 8);
        assert_eq!(eval.evaluate("round(2.5)").unwrap(), 3);
    }

    #[test]
    fn function_arity_and_unknown_names_fault() {
        let mut eval = evaluator();
        assert!(matches!(
            eval.evaluate("pow(2)"),
            Err(Fault::MalformedExpression(_))
        ));
        assert!(matches!(
            eval.evaluate("pow(2,3,4)"),
            Err(Fault::MalformedExpression(_))
        ));
        assert!(matches!(
            eval.evaluate("nosuch(1)"),
            Err(Fault::MalformedExpression(_))
        ));
    }

    #[test]
    fn malformed_expressions_fault() {
        let mut eval = evaluator();
        for bad in ["", "  ", "(5+2", "5)", "5 6", "5+", "*5", "5&&"] {
            assert!(
                matches!(eval.evaluate(bad), Err(Fault::MalformedExpression(_))),
                "expected malformed: {bad:?}"
            );
        }
    }

    #[test]
    fn substitution_splices_symbol_values() {
        let mut eval = evaluator();
        eval.register_substitution(
            r"[a-zA-Z_][a-zA-Z0-9_]*",
            None,
            Box::new(|name| match name {
                "width" => Some(String::from("40")),
                "height" => Some(String::from("25")),
                _ => None,
            }),
        )
        .unwrap();
        assert_eq!(eval.evaluate("width*height").unwrap(), 1000);
        assert!(matches!(
            eval.evaluate("width*missing"),
            Err(Fault::UndefinedSymbol(name)) if name == "missing"
        ));
    }

    #[test]
    fn guard_rejects_non_symbol_matches() {
        let mut eval = evaluator();
        // a star is the program counter only when it cannot be a
        // multiplication
        eval.register_substitution(
            r"\*",
            Some(|prev, next| {
                let operand_ish = |c: Option<char>| {
                    c.map(|c| c.is_ascii_alphanumeric() || c == ')' || c == '(')
                        .unwrap_or(false)
                };
                !operand_ish(prev) && !operand_ish(next)
            }),
            Box::new(|_| Some(String::from("4096"))),
        )
        .unwrap();
        assert_eq!(eval.evaluate("*+2").unwrap(), 4098);
        assert_eq!(eval.evaluate("2*3").unwrap(), 6);
    }

    #[test]
    fn only_symbol_free_expressions_are_cached() {
        let mut eval = evaluator();
        eval.register_substitution(
            r"[a-zA-Z_][a-zA-Z0-9_]*",
            None,
            Box::new(|_| Some(String::from("1"))),
        )
        .unwrap();
        assert_eq!(eval.evaluate("2*3").unwrap(), 6);
        assert_eq!(eval.evaluate("x+1").unwrap(), 2);
        assert!(eval.cache.contains_key("2*3"));
        assert!(!eval.cache.contains_key("x+1"));
    }

    #[test]
    fn changed_symbol_values_are_picked_up() {
        use std::cell::Cell;
        use std::rc::Rc;

        let value = Rc::new(Cell::new(10i64));
        let value_in = Rc::clone(&value);
        let mut eval = evaluator();
        eval.register_substitution(
            r"[a-zA-Z_][a-zA-Z0-9_]*",
            None,
            Box::new(move |_| Some(value_in.get().to_string())),
        )
        .unwrap();
        assert_eq!(eval.evaluate("target+1").unwrap(), 11);
        value.set(20);
        assert_eq!(eval.evaluate("target+1").unwrap(), 21);
    }

    #[test]
    fn whitespace_around_operators_is_tolerated() {
        let mut eval = evaluator();
        assert_eq!(eval.evaluate(" 2 + 3 * 4").unwrap(), 14);
        assert_eq!(eval.evaluate("5 - 3").unwrap(), 2);
        assert_eq!(eval.evaluate("1 << 4").unwrap(), 16);
    }

    proptest! {
        #[test]
        fn addition_matches_integer_arithmetic(a in 0u32..0xFFFF, b in 0u32..0xFFFF) {
            let mut eval = evaluator();
            let expr = format!("{a}+{b}");
            prop_assert_eq!(eval.evaluate(&expr).unwrap(), (a + b) as i64);
        }

        #[test]
        fn grouping_is_neutral(a in 0u32..0xFFFF, b in 0u32..0xFFFF) {
            let mut eval = evaluator();
            let plain = eval.evaluate(&format!("{a}*2+{b}")).unwrap();
            let grouped = eval.evaluate(&format!("({a}*2)+({b})")).unwrap();
            prop_assert_eq!(plain, grouped);
        }

        #[test]
        fn hex_literals_match_decimal(v in 0u32..0xFFFFFF) {
            let mut eval = evaluator();
            let hex = eval.evaluate(&format!("${v:x}")).unwrap();
            prop_assert_eq!(hex, v as i64);
        }

        #[test]
        fn cached_results_are_stable(v in 0u32..0xFFFF) {
            let mut eval = evaluator();
            let expr = format!("{v}*2+1");
            let first = eval.evaluate(&expr).unwrap();
            let second = eval.evaluate(&expr).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn low_high_bytes_recombine(v in 0u32..0xFFFF) {
            let mut eval = evaluator();
            let low = eval.evaluate(&format!("<{v}")).unwrap();
            let high = eval.evaluate(&format!(">{v}")).unwrap();
            prop_assert_eq!(high * 256 + low, v as i64);
        }
    }
}
