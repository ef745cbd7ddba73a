use std::cell::RefCell;
use std::collections::HashMap;
use std::mem;
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};

use crate::callable::{Callable, LoxClass, LoxFunction, LoxInstance, NativeFunction, INITIALIZER};
use crate::environment::{EnvRef, Environment};
use crate::error::{LoxError, Result};
use crate::expr::{Expr, ExprId, LiteralValue};
use crate::host::SharedHost;
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Nested Lox calls allowed before a call fails with `Stack overflow.`.
pub const MAX_CALL_DEPTH: usize = 4096;

/// How a statement finished.  `Break` and `Return` unwind through enclosing
/// statements until a loop or a call boundary consumes them.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Break,
    Return(Value),
}

pub struct Interpreter {
    globals: EnvRef,
    environment: EnvRef,

    /// Resolver side‑table: expression → scope hops.  Absent ⇒ global.
    locals: HashMap<ExprId, usize>,

    /// Loops entered within the current call frame.
    loop_depth: usize,

    /// Lox calls currently on the stack.
    call_depth: usize,

    /// Side-table entries outside any function body.  They are dead once the
    /// program that produced them has run.
    top_level: Vec<ExprId>,

    host: SharedHost,
}

fn clock(_args: &[Value]) -> Value {
    Value::Number(Utc::now().timestamp_millis() as f64 / 1000.0)
}

impl Interpreter {
    /// Creates a new Interpreter and defines native functions such as `clock`.
    pub fn new(host: SharedHost) -> Self {
        info!("Initializing Interpreter");

        let globals: EnvRef = Rc::new(RefCell::new(Environment::new()));

        debug!("Defining native function 'clock'");

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction(Rc::new(NativeFunction {
                name: "clock",
                arity: 0,
                func: clock,
            })),
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            loop_depth: 0,
            call_depth: 0,
            top_level: Vec::new(),
            host,
        }
    }

    /// Record that the expression `id` refers to a binding `depth` scopes up.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        debug!("Noting local {:?} at depth {}", id, depth);

        self.locals.insert(id, depth);
    }

    /// Mark `id` as belonging to top-level code, dropped after the next run.
    pub fn note_top_level(&mut self, id: ExprId) {
        self.top_level.push(id);
    }

    /// Drop side-table entries for `ids`.
    pub fn forget(&mut self, ids: &[ExprId]) {
        for id in ids {
            self.locals.remove(id);
        }
    }

    /// Drop the entries of top-level code that has finished running.
    pub fn forget_top_level(&mut self) {
        let ids: Vec<ExprId> = mem::take(&mut self.top_level);
        self.forget(&ids);
    }

    /// The recorded scope distance for `id`, or `None` for a global.
    pub fn resolved_depth(&self, id: ExprId) -> Option<usize> {
        self.locals.get(&id).copied()
    }

    /// Executes a resolved program.  The first runtime error stops the
    /// remaining statements and is returned to the caller.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        let result: Result<()> = statements
            .iter()
            .try_for_each(|stmt| self.execute(stmt).map(drop));

        self.forget_top_level();

        if result.is_ok() {
            info!("Interpretation completed successfully");
        }

        result
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;
                debug!("Printing value: {}", value);

                self.host.borrow_mut().out_line(&value.to_string());
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                match initializer {
                    Some(expr) => {
                        let value: Value = self.evaluate(expr)?;
                        debug!("Defining variable '{}' = {}", name.lexeme, value);

                        self.environment.borrow_mut().define(&name.lexeme, value);
                    }
                    None => {
                        debug!("Declaring variable '{}' without initializer", name.lexeme);

                        self.environment.borrow_mut().declare(&name.lexeme);
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let scope: EnvRef = Environment::child_of(&self.environment);
                self.execute_block(statements, scope)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                self.loop_depth += 1;
                let result = self.run_loop(condition, body);
                self.loop_depth -= 1;

                result
            }

            Stmt::Break(keyword) => {
                if self.loop_depth == 0 {
                    return Err(LoxError::runtime(keyword, "Break occurred outside loop."));
                }

                Ok(Flow::Break)
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);

                Ok(Flow::Return(value))
            }

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name.lexeme);

                let function = LoxFunction::new(
                    Rc::clone(declaration),
                    Rc::clone(&self.environment),
                    false,
                );

                self.environment.borrow_mut().define(
                    &declaration.name.lexeme,
                    Value::Function(Rc::new(function)),
                );
                Ok(Flow::Normal)
            }

            Stmt::Class { name, methods } => {
                debug!("Defining class '{}'", name.lexeme);

                self.environment.borrow_mut().declare(&name.lexeme);

                let methods: HashMap<String, Rc<LoxFunction>> = methods
                    .iter()
                    .map(|method: &Rc<FunctionDecl>| {
                        let function = LoxFunction::new(
                            Rc::clone(method),
                            Rc::clone(&self.environment),
                            method.name.lexeme == INITIALIZER,
                        );
                        (method.name.lexeme.clone(), Rc::new(function))
                    })
                    .collect();

                let class = LoxClass::new(name.lexeme.clone(), methods);

                self.environment
                    .borrow_mut()
                    .assign(name, Value::Class(Rc::new(class)))?;
                Ok(Flow::Normal)
            }
        }
    }

    fn run_loop(&mut self, condition: &Expr, body: &Stmt) -> Result<Flow> {
        while self.evaluate(condition)?.is_truthy() {
            match self.execute(body)? {
                Flow::Normal => {}
                Flow::Break => break,
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }

        Ok(Flow::Normal)
    }

    /// Run `statements` in `scope`, restoring the current scope on every exit
    /// path.
    pub fn execute_block(&mut self, statements: &[Stmt], scope: EnvRef) -> Result<Flow> {
        let previous: EnvRef = mem::replace(&mut self.environment, scope);

        let mut result: Result<Flow> = Ok(Flow::Normal);
        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => {}
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;
        result
    }

    /// Run a function body as a fresh frame: loops outside the call are not
    /// visible to `break` inside it.
    pub fn execute_call_body(&mut self, body: &[Stmt], scope: EnvRef) -> Result<Flow> {
        let outer_loops: usize = mem::replace(&mut self.loop_depth, 0);
        let result = self.execute_block(body, scope);
        self.loop_depth = outer_loops;

        result
    }

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => {
                let right: Value = self.evaluate(right)?;
                self.evaluate_unary(operator, right)
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;
                let right: Value = self.evaluate(right)?;
                self.evaluate_binary(left, operator, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;

                let short_circuit: bool = match operator.token_type {
                    TokenType::OR => left.is_truthy(),
                    _ => !left.is_truthy(),
                };

                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(name, *id),

            Expr::This { id, keyword } => self.look_up_variable(keyword, *id),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;
                debug!("Assigning {} to '{}'", value, name.lexeme);

                match self.resolved_depth(*id) {
                    Some(distance) => {
                        Environment::assign_at(&self.environment, distance, name, value.clone())?
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value = self.evaluate(callee)?;

                let mut values: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument)?);
                }

                match &callee {
                    Value::NativeFunction(native) => self.invoke(&**native, paren, values),
                    Value::Function(function) => self.invoke(&**function, paren, values),
                    Value::Class(class) => self.invoke(class, paren, values),
                    _ => Err(LoxError::runtime(
                        paren,
                        "Can only call functions and classes.",
                    )),
                }
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => LoxInstance::get(&instance, name),
                _ => Err(LoxError::runtime(name, "Only instances have properties.")),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(LoxError::runtime(name, "Only instances have fields."));
                };

                let value: Value = self.evaluate(value)?;
                instance.borrow_mut().set(name, value.clone());

                Ok(value)
            }
        }
    }

    fn look_up_variable(&self, name: &Token, id: ExprId) -> Result<Value> {
        match self.resolved_depth(id) {
            Some(distance) => Environment::get_at(&self.environment, distance, name),
            None => self.globals.borrow().get(name),
        }
    }

    fn invoke(
        &mut self,
        callable: &dyn Callable,
        paren: &Token,
        arguments: Vec<Value>,
    ) -> Result<Value> {
        if arguments.len() != callable.arity() {
            return Err(LoxError::runtime(
                paren,
                format!(
                    "Expected {} arguments but got {}.",
                    callable.arity(),
                    arguments.len()
                ),
            ));
        }

        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(LoxError::runtime(paren, "Stack overflow."));
        }

        self.call_depth += 1;
        let result = callable.call(self, arguments);
        self.call_depth -= 1;

        result
    }

    fn evaluate_unary(&self, operator: &Token, right: Value) -> Result<Value> {
        match operator.token_type {
            TokenType::MINUS => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(LoxError::runtime(operator, "Operand must be a number.")),
            },
            TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),
            _ => Err(LoxError::runtime(operator, "Invalid unary operator.")),
        }
    }

    fn evaluate_binary(&self, left: Value, operator: &Token, right: Value) -> Result<Value> {
        match operator.token_type {
            TokenType::EQUAL_EQUAL => return Ok(Value::Bool(left == right)),
            TokenType::BANG_EQUAL => return Ok(Value::Bool(left != right)),
            TokenType::PLUS => return add(left, operator, right),
            _ => {}
        }

        let (Value::Number(a), Value::Number(b)) = (left, right) else {
            return Err(LoxError::runtime(operator, "Operands must be numbers."));
        };

        match operator.token_type {
            TokenType::MINUS => Ok(Value::Number(a - b)),
            TokenType::STAR => Ok(Value::Number(a * b)),
            TokenType::SLASH => {
                if b == 0.0 {
                    Err(LoxError::runtime(operator, "Division by zero"))
                } else {
                    Ok(Value::Number(a / b))
                }
            }
            TokenType::GREATER => Ok(Value::Bool(a > b)),
            TokenType::GREATER_EQUAL => Ok(Value::Bool(a >= b)),
            TokenType::LESS => Ok(Value::Bool(a < b)),
            TokenType::LESS_EQUAL => Ok(Value::Bool(a <= b)),
            _ => Err(LoxError::runtime(operator, "Invalid binary operator.")),
        }
    }
}

/// `+` adds numbers; if either side is a string both are stringified and
/// concatenated.
fn add(left: Value, operator: &Token, right: Value) -> Result<Value> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (Value::String(a), right) => Ok(Value::String(format!("{}{}", a, right))),
        (left, Value::String(b)) => Ok(Value::String(format!("{}{}", left, b))),
        _ => Err(LoxError::runtime(
            operator,
            "Operands must be two numbers or at least one string.",
        )),
    }
}
