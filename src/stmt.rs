use std::rc::Rc;

use crate::expr::Expr;
use crate::token::Token;

/// A function or method declaration.  Shared (`Rc`) between the statement
/// tree and every closure created from it.
#[derive(Debug)]
pub struct FunctionDecl {
    pub name: Token,

    /// Parameter name tokens (arity ≤ 255).
    pub params: Vec<Token>,

    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expression(Expr),

    Print(Expr),

    /// `var name (= initializer)?;`
    Var {
        name: Token,
        initializer: Option<Expr>,
    },

    Block(Vec<Stmt>),

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    /// `while` loop; `for` loops are desugared into this.
    While {
        condition: Expr,
        body: Box<Stmt>,
    },

    /// `break;`; the keyword token locates runtime errors.
    Break(Token),

    Return {
        keyword: Token,
        value: Option<Expr>,
    },

    Function(Rc<FunctionDecl>),

    Class {
        name: Token,
        methods: Vec<Rc<FunctionDecl>>,
    },
}
