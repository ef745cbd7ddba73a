use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle to a scope.  Closures keep their defining scope alive.
pub type EnvRef = Rc<RefCell<Environment>>;

/// One lexical scope: name → cell, plus the enclosing scope.
///
/// A cell holding `None` was declared by `var x;` and has not been assigned
/// yet; reading it is a runtime error.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Option<Value>>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wrap a fresh scope whose parent is `enclosing`.
    pub fn child_of(enclosing: &EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(enclosing))))
    }

    /// Bind `name` to `value` in this scope, replacing any previous binding.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), Some(value));
    }

    /// Bind `name` in this scope without a value.
    pub fn declare(&mut self, name: &str) {
        self.values.insert(name.to_string(), None);
    }

    /// Look `name` up here, then outward.
    pub fn get(&self, name: &Token) -> Result<Value> {
        match self.values.get(&name.lexeme) {
            Some(cell) => read_cell(cell, name),
            None => match &self.enclosing {
                Some(enclosing) => enclosing.borrow().get(name),
                None => Err(undefined(name)),
            },
        }
    }

    /// Assign to the nearest existing binding of `name`.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if let Some(cell) = self.values.get_mut(&name.lexeme) {
            *cell = Some(value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }

    /// Read `name` from the scope exactly `distance` hops above `env`.
    pub fn get_at(env: &EnvRef, distance: usize, name: &Token) -> Result<Value> {
        let scope: EnvRef = Self::ancestor(env, distance).ok_or_else(|| undefined(name))?;
        let scope = scope.borrow();

        match scope.values.get(&name.lexeme) {
            Some(cell) => read_cell(cell, name),
            None => Err(undefined(name)),
        }
    }

    /// Write `name` in the scope exactly `distance` hops above `env`.
    pub fn assign_at(env: &EnvRef, distance: usize, name: &Token, value: Value) -> Result<()> {
        let scope: EnvRef = Self::ancestor(env, distance).ok_or_else(|| undefined(name))?;
        let mut scope = scope.borrow_mut();

        match scope.values.get_mut(&name.lexeme) {
            Some(cell) => {
                *cell = Some(value);
                Ok(())
            }
            None => Err(undefined(name)),
        }
    }

    /// The scope `distance` hops above `env` (0 = `env` itself).
    pub fn ancestor(env: &EnvRef, distance: usize) -> Option<EnvRef> {
        let mut scope: EnvRef = Rc::clone(env);

        for _ in 0..distance {
            let next: EnvRef = scope.borrow().enclosing.clone()?;
            scope = next;
        }

        Some(scope)
    }

    /// Initialised value bound directly in this scope, if any.
    pub fn get_here(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned().flatten()
    }
}

fn read_cell(cell: &Option<Value>, name: &Token) -> Result<Value> {
    match cell {
        Some(value) => Ok(value.clone()),
        None => Err(LoxError::runtime(
            name,
            format!("Variable not yet initialized '{}'.", name.lexeme),
        )),
    }
}

fn undefined(name: &Token) -> LoxError {
    LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::IDENTIFIER, name, 1)
    }

    #[test]
    fn get_at_reads_the_exact_ancestor() {
        let globals: EnvRef = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define("a", Value::Number(1.0));

        let middle: EnvRef = Environment::child_of(&globals);
        middle.borrow_mut().define("a", Value::Number(2.0));

        let inner: EnvRef = Environment::child_of(&middle);

        let a = ident("a");
        assert_eq!(Environment::get_at(&inner, 1, &a).unwrap(), Value::Number(2.0));
        assert_eq!(Environment::get_at(&inner, 2, &a).unwrap(), Value::Number(1.0));
        assert!(Environment::get_at(&inner, 0, &a).is_err());
        assert!(Environment::ancestor(&inner, 3).is_none());
    }

    #[test]
    fn declared_cell_errors_until_assigned() {
        let env: EnvRef = Rc::new(RefCell::new(Environment::new()));
        env.borrow_mut().declare("x");

        let x = ident("x");
        let err = env.borrow().get(&x).unwrap_err();
        assert_eq!(err.to_string(), "Variable not yet initialized 'x'.\n[line 1]");

        env.borrow_mut().assign(&x, Value::Bool(true)).unwrap();
        assert_eq!(env.borrow().get(&x).unwrap(), Value::Bool(true));
    }

    #[test]
    fn assign_walks_outward_and_rejects_unknown_names() {
        let outer: EnvRef = Rc::new(RefCell::new(Environment::new()));
        outer.borrow_mut().define("n", Value::Nil);
        let inner: EnvRef = Environment::child_of(&outer);

        inner
            .borrow_mut()
            .assign(&ident("n"), Value::Number(7.0))
            .unwrap();
        assert_eq!(outer.borrow().get_here("n"), Some(Value::Number(7.0)));

        let err = inner
            .borrow_mut()
            .assign(&ident("missing"), Value::Nil)
            .unwrap_err();
        assert_eq!(err.to_string(), "Undefined variable 'missing'.\n[line 1]");
    }
}
