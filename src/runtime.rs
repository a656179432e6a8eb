use std::time::{Duration, Instant};

use indexmap::IndexSet;

use crate::{
    context::Context,
    diagnostics::{error, ErrorKind, NScriptError, Result, SourceSpan},
    lexer::{Lexer, State, Token},
    object::{Array, UserClass, UserFunction, Variable},
    operators::{self, Deref},
    value::{dereference, to_bool, Value},
};

/// Precedence ladder walked by the evaluator, loosest binding first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Script,
    Statement,
    Assignment,
    Conditional,
    Logical,
    Bitwise,
    Equality,
    Relational,
    Additive,
    Multiplicative,
    Power,
    Unary,
    Postfix,
    Primary,
}

impl Level {
    fn next(self) -> Level {
        match self {
            Level::Script => Level::Statement,
            Level::Statement => Level::Assignment,
            Level::Assignment => Level::Conditional,
            Level::Conditional => Level::Logical,
            Level::Logical => Level::Bitwise,
            Level::Bitwise => Level::Equality,
            Level::Equality => Level::Relational,
            Level::Relational => Level::Additive,
            Level::Additive => Level::Multiplicative,
            Level::Multiplicative => Level::Power,
            Level::Power => Level::Unary,
            Level::Unary => Level::Postfix,
            Level::Postfix | Level::Primary => Level::Primary,
        }
    }
}

/// Per-interpreter evaluation limits. Both are off by default; hosts running
/// untrusted scripts should set at least one.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalConfig {
    /// Maximum number of iterations a single loop may run.
    pub loop_limit: Option<u64>,
    /// Wall-clock bound on a single loop.
    pub loop_timeout: Option<Duration>,
}

/// The engine itself. There is no syntax tree: expressions are evaluated
/// while their tokens are consumed, and control flow re-reads source spans
/// through the lexer's replayable state. In skip mode tokens are consumed
/// without side effects, which is how untaken branches and closure bodies
/// are passed over.
pub struct Interpreter {
    lexer: Lexer,
    context: Context,
    captures: IndexSet<String>,
    config: EvalConfig,
    skip: bool,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(EvalConfig::default())
    }

    pub fn with_config(config: EvalConfig) -> Self {
        Self::with_context(Context::new(), config)
    }

    pub(crate) fn with_context(context: Context, config: EvalConfig) -> Self {
        Self {
            lexer: Lexer::new(),
            context,
            captures: IndexSet::new(),
            config,
            skip: false,
        }
    }

    /// Installs a host binding as an assignable cell in the root scope.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.context
            .set(name, Value::object(Variable::new(value)));
    }

    /// Evaluates a script and returns its fully resolved result. Bindings
    /// made by the script persist in this interpreter; scopes opened by a
    /// failing script are unwound.
    pub fn eval(&mut self, source: &str) -> Result<Value> {
        let depth = self.context.depth();
        let outcome = self.eval_source(source);
        self.context.truncate(depth);
        outcome.map_err(|err| self.annotate(err, source))
    }

    fn eval_source(&mut self, source: &str) -> Result<Value> {
        self.lexer.init(source)?;
        let mut result = Value::Empty;
        self.parse(Level::Script, &mut result)?;
        if self.lexer.token() != Token::End {
            return Err(error(ErrorKind::SyntaxError, "unexpected input"));
        }
        dereference(&mut result)?;
        Ok(result)
    }

    /// Runs a function or class body: same machinery as [`eval`], but the
    /// result is left unresolved so member lookups yield assignable cells.
    ///
    /// [`eval`]: Interpreter::eval
    pub(crate) fn exec_body(&mut self, source: &str) -> Result<Value> {
        self.lexer.init(source)?;
        let mut result = Value::Empty;
        self.parse(Level::Script, &mut result)?;
        Ok(result)
    }

    /// Pins the failure position and source text onto a diagnostic. Applied
    /// at every `eval` boundary, so the outermost script wins.
    fn annotate(&self, err: NScriptError, source: &str) -> NScriptError {
        match err {
            NScriptError::Diagnostic(diagnostic) => {
                let at = self.lexer.get_state();
                NScriptError::Diagnostic(
                    diagnostic
                        .with_span(SourceSpan::new(at, at))
                        .with_content(source),
                )
            }
            other => other,
        }
    }

    fn parse(&mut self, level: Level, result: &mut Value) -> Result<()> {
        match level {
            Level::Primary => self.parse_primary(result),
            Level::Statement => self.parse_statement(result),
            Level::Unary => self.parse_unary(result),
            _ => {
                self.parse(level.next(), result)?;
                while self.lexer.token() != Token::End {
                    match operators::find(level, self.lexer.token()) {
                        Some(entry) => self.apply(level, entry, result)?,
                        None => break,
                    }
                }
                Ok(())
            }
        }
    }

    /// Consumes one infix or postfix operator and folds it into `result`.
    fn apply(
        &mut self,
        level: Level,
        entry: &'static operators::OpEntry,
        result: &mut Value,
    ) -> Result<()> {
        if entry.token == Token::Question {
            return self.parse_ternary(result);
        }
        let mut x = std::mem::replace(result, Value::Empty);
        // Trailing operators fold with the left value itself, so a script
        // ending in `;` keeps its result.
        let mut y = x.clone();
        match entry.token {
            Token::Dot => {
                y = Value::Str(self.lexer.name().to_owned());
                self.lexer.next()?;
            }
            Token::LPar | Token::LSquare => {
                self.lexer.next()?;
                y = Value::Empty;
                self.parse(Level::Statement, &mut y)?;
                self.lexer.check_pair(entry.token)?;
            }
            Token::Inc | Token::Dec if level == Level::Postfix => {
                self.lexer.next()?;
                if !self.skip {
                    y = x.clone();
                    dereference(&mut y)?;
                }
            }
            Token::Apo if level == Level::Postfix => {
                self.lexer.next()?;
            }
            _ => {
                self.lexer.next()?;
                match entry.assoc {
                    operators::Assoc::Right => self.parse(level, &mut y)?,
                    _ => self.parse(level.next(), &mut y)?,
                }
            }
        }
        if self.skip {
            return Ok(());
        }
        if matches!(entry.deref, Deref::Left | Deref::Both) {
            dereference(&mut x)?;
        }
        if matches!(entry.deref, Deref::Right | Deref::Both) {
            dereference(&mut y)?;
        }
        *result = (entry.apply)(x, y)?;
        Ok(())
    }

    /// Comma lists collapse into an array; a single expression stays bare.
    fn parse_statement(&mut self, result: &mut Value) -> Result<()> {
        self.parse(Level::Assignment, result)?;
        if self.lexer.token() != Token::Comma {
            return Ok(());
        }
        let mut items = Vec::new();
        if !self.skip {
            let mut first = std::mem::replace(result, Value::Empty);
            dereference(&mut first)?;
            items.push(first);
        }
        while self.lexer.token() == Token::Comma {
            self.lexer.next()?;
            let mut item = Value::Empty;
            self.parse(Level::Assignment, &mut item)?;
            if !self.skip {
                dereference(&mut item)?;
                items.push(item);
            }
        }
        if !self.skip {
            *result = Value::object(Array::from_items(items));
        }
        Ok(())
    }

    fn parse_unary(&mut self, result: &mut Value) -> Result<()> {
        let token = self.lexer.token();
        if token == Token::End {
            return Ok(());
        }
        match operators::find(Level::Unary, token) {
            Some(entry) => {
                self.lexer.next()?;
                let mut y = Value::Empty;
                self.parse(Level::Unary, &mut y)?;
                if !self.skip {
                    if matches!(entry.deref, Deref::Right | Deref::Both) {
                        dereference(&mut y)?;
                    }
                    *result = (entry.apply)(Value::Empty, y)?;
                }
                Ok(())
            }
            None => self.parse(Level::Postfix, result),
        }
    }

    fn parse_primary(&mut self, result: &mut Value) -> Result<()> {
        match self.lexer.token() {
            Token::End => Err(error(ErrorKind::UnexpectedEof, "expression")),
            Token::Literal => {
                if !self.skip {
                    *result = self.lexer.value();
                }
                self.lexer.next()?;
                Ok(())
            }
            Token::Name => {
                *result = self.parse_name(false);
                self.lexer.next()?;
                Ok(())
            }
            Token::My => {
                self.lexer.next()?;
                if self.lexer.token() != Token::Name {
                    return Err(error(ErrorKind::SyntaxError, "'my'"));
                }
                *result = self.parse_name(true);
                self.lexer.next()?;
                Ok(())
            }
            Token::If => self.parse_cond(result),
            Token::For => self.parse_for(result),
            Token::Func => self.parse_func(result),
            Token::Object => self.parse_class(result),
            Token::LPar => {
                self.lexer.next()?;
                *result = Value::Empty;
                self.parse(Level::Statement, result)?;
                self.lexer.check_pair(Token::LPar)
            }
            Token::LSquare => self.parse_array(result),
            Token::LCurly => {
                self.lexer.next()?;
                self.context.push();
                *result = Value::Empty;
                let parsed = self.parse(Level::Script, result);
                self.context.pop();
                parsed?;
                self.lexer.check_pair(Token::LCurly)
            }
            // Closing delimiters and separators end the expression quietly.
            _ => Ok(()),
        }
    }

    /// Resolves the current `Name` token. In skip mode the name is recorded
    /// as a candidate free variable instead; this is the collection half of
    /// the two-pass closure capture.
    fn parse_name(&mut self, local: bool) -> Value {
        let name = self.lexer.name().to_owned();
        if self.skip {
            self.captures.insert(name);
            Value::Empty
        } else {
            self.context.get(&name, local)
        }
    }

    /// `[a, b, c]` always builds an array, even with a single element.
    fn parse_array(&mut self, result: &mut Value) -> Result<()> {
        self.lexer.next()?;
        let mut items = Vec::new();
        if self.lexer.token() == Token::RSquare {
            self.lexer.next()?;
        } else {
            loop {
                let mut item = Value::Empty;
                self.parse(Level::Assignment, &mut item)?;
                if !self.skip {
                    dereference(&mut item)?;
                    items.push(item);
                }
                if self.lexer.token() == Token::Comma {
                    self.lexer.next()?;
                    continue;
                }
                self.lexer.check_pair(Token::LSquare)?;
                break;
            }
        }
        if !self.skip {
            *result = Value::object(Array::from_items(items));
        }
        Ok(())
    }

    /// `if cond a [else b]`. The condition is an ordinary assignment-level
    /// expression; parentheses around it are plain grouping.
    fn parse_cond(&mut self, result: &mut Value) -> Result<()> {
        self.lexer.next()?;
        let mut cond = Value::Empty;
        self.parse(Level::Assignment, &mut cond)?;
        let condition = self.skip || {
            dereference(&mut cond)?;
            to_bool(&cond)?
        };
        self.parse_branches(Level::Assignment, condition, result)
    }

    fn parse_ternary(&mut self, result: &mut Value) -> Result<()> {
        self.lexer.next()?;
        let mut cond = std::mem::replace(result, Value::Empty);
        let condition = self.skip || {
            dereference(&mut cond)?;
            to_bool(&cond)?
        };
        self.parse_branches(Level::Logical, condition, result)
    }

    /// Evaluates the taken branch and skips over the other one.
    fn parse_branches(&mut self, level: Level, condition: bool, result: &mut Value) -> Result<()> {
        let outer = self.skip;
        let mut taken = Value::Empty;
        self.skip = outer || !condition;
        let parsed = self.parse(level, &mut taken);
        self.skip = outer;
        parsed?;
        if condition {
            *result = taken;
        }
        if matches!(self.lexer.token(), Token::Else | Token::Colon) {
            self.lexer.next()?;
            let mut alternative = Value::Empty;
            self.skip = outer || condition;
            let parsed = self.parse(level, &mut alternative);
            self.skip = outer;
            parsed?;
            if !condition {
                *result = alternative;
            }
        } else if !condition {
            *result = Value::Empty;
        }
        Ok(())
    }

    /// `for (init; cond; incr) body`. The loop re-evaluates cond, body and
    /// incr by replaying their source spans; the result is the body's last
    /// value. An empty condition ends the loop immediately.
    fn parse_for(&mut self, result: &mut Value) -> Result<()> {
        self.lexer.next()?;
        if self.lexer.token() != Token::LPar {
            return Err(error(ErrorKind::MissingCharacter, "'('"));
        }
        self.lexer.next()?;
        let mut init = Value::Empty;
        self.parse(Level::Statement, &mut init)?;
        if self.lexer.token() != Token::Stmt {
            return Err(error(ErrorKind::MissingCharacter, "';'"));
        }
        self.lexer.next()?;
        let cond_state = self.lexer.get_state();
        self.scan(Level::Statement)?;
        if self.lexer.token() != Token::Stmt {
            return Err(error(ErrorKind::MissingCharacter, "';'"));
        }
        self.lexer.next()?;
        let incr_state = self.lexer.get_state();
        self.scan(Level::Statement)?;
        self.lexer.check_pair(Token::LPar)?;
        let body_state = self.lexer.get_state();
        self.scan(Level::Statement)?;
        let end_state = self.lexer.get_state();
        if !self.skip {
            let started = Instant::now();
            let mut iterations = 0u64;
            loop {
                let mut cond = self.replay(cond_state)?;
                dereference(&mut cond)?;
                if !to_bool(&cond)? {
                    break;
                }
                *result = self.replay(body_state)?;
                self.replay(incr_state)?;
                iterations += 1;
                if let Some(limit) = self.config.loop_limit {
                    if iterations >= limit {
                        return Err(error(
                            ErrorKind::TooManyIterations,
                            format!("limit of {limit}"),
                        ));
                    }
                }
                if let Some(timeout) = self.config.loop_timeout {
                    if started.elapsed() >= timeout {
                        return Err(error(ErrorKind::TooManyIterations, "time budget"));
                    }
                }
            }
        }
        self.lexer.set_state(end_state)?;
        Ok(())
    }

    /// Re-evaluates a previously scanned span.
    fn replay(&mut self, state: State) -> Result<Value> {
        self.lexer.set_state(state)?;
        let mut value = Value::Empty;
        self.parse(Level::Statement, &mut value)?;
        Ok(value)
    }

    /// Consumes one expression at `level` without evaluating it.
    fn scan(&mut self, level: Level) -> Result<()> {
        let outer = self.skip;
        self.skip = true;
        let mut ignored = Value::Empty;
        let parsed = self.parse(level, &mut ignored);
        self.skip = outer;
        parsed
    }

    /// `sub(args) body`. The body is scanned, not evaluated; names it reads
    /// become capture candidates and the resolvable ones are snapshotted
    /// into the closure's context.
    fn parse_func(&mut self, result: &mut Value) -> Result<()> {
        self.lexer.next()?;
        let args = self.parse_args()?;
        if !self.skip {
            self.captures.clear();
        }
        let body_state = self.lexer.get_state();
        self.scan(Level::Assignment)?;
        let body = self
            .lexer
            .content(body_state, self.lexer.get_state())
            .to_owned();
        if !self.skip {
            let context = Context::capture(&self.context, &self.captures);
            *result = Value::object(UserFunction::new(args, body, context, self.config));
        }
        Ok(())
    }

    /// `object [(args)] body`. Braces around the body are optional; when
    /// present the body runs at Script level up to the matching `}`.
    fn parse_class(&mut self, result: &mut Value) -> Result<()> {
        self.lexer.next()?;
        let args = self.parse_args()?;
        let braced = self.lexer.token() == Token::LCurly;
        if braced {
            self.lexer.next()?;
        }
        if self.lexer.token() == Token::End {
            return Err(error(ErrorKind::SyntaxError, "'object'"));
        }
        if !self.skip {
            self.captures.clear();
        }
        let body_state = self.lexer.get_state();
        self.scan(Level::Script)?;
        let body = self
            .lexer
            .content(body_state, self.lexer.get_state())
            .to_owned();
        if braced {
            self.lexer.check_pair(Token::LCurly)?;
        }
        if !self.skip {
            let context = Context::capture(&self.context, &self.captures);
            *result = Value::object(UserClass::new(args, body, context, self.config));
        }
        Ok(())
    }

    /// Optional parenthesized list of parameter names. Without parentheses
    /// the function is variadic and receives its parameters as `@`.
    fn parse_args(&mut self) -> Result<Vec<String>> {
        let mut args = Vec::new();
        if self.lexer.token() != Token::LPar {
            return Ok(args);
        }
        self.lexer.next()?;
        loop {
            match self.lexer.token() {
                Token::RPar => {
                    self.lexer.next()?;
                    break;
                }
                Token::Name => {
                    args.push(self.lexer.name().to_owned());
                    match self.lexer.next()? {
                        Token::Comma => {
                            self.lexer.next()?;
                        }
                        Token::RPar => {
                            self.lexer.next()?;
                            break;
                        }
                        _ => return Err(error(ErrorKind::SyntaxError, "argument list")),
                    }
                }
                _ => return Err(error(ErrorKind::SyntaxError, "argument list")),
            }
        }
        Ok(args)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
