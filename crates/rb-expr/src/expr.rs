//! Expression tree and traversal.

use crate::space::FunctionSpace;
use rb_core::{ProblemId, Real};
use std::ops;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Abs,
    Sqrt,
    Exp,
    Log,
    Sin,
    Cos,
    Tanh,
}

impl UnaryOp {
    pub fn apply(self, x: Real) -> Real {
        match self {
            UnaryOp::Neg => -x,
            UnaryOp::Abs => x.abs(),
            UnaryOp::Sqrt => x.sqrt(),
            UnaryOp::Exp => x.exp(),
            UnaryOp::Log => x.ln(),
            UnaryOp::Sin => x.sin(),
            UnaryOp::Cos => x.cos(),
            UnaryOp::Tanh => x.tanh(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn apply(self, a: Real, b: Real) -> Real {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => a.powf(b),
        }
    }
}

/// A pointwise expression. `Solution` and `Component` are the problem-solution
/// terminals; everything else is ordinary.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Constant(Real),
    /// `mu[i]` of the driving problem.
    Parameter(usize),
    Time,
    /// Node coordinate along an axis.
    Coordinate(usize),
    /// Whole solution of a problem.
    Solution(ProblemId),
    /// Named sub-field of a solution (possibly nested).
    Component { base: Box<Expr>, name: String },
    Unary { op: UnaryOp, arg: Box<Expr> },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// Result of identifying a problem-solution terminal.
#[derive(Debug)]
pub struct SolutionTerminal<'a> {
    pub problem: ProblemId,
    /// Dotted component path; `None` for the whole solution.
    pub component: Option<String>,
    /// The whole-solution node this terminal reads from.
    pub minimal: &'a Expr,
    /// Every solution node nested inside the terminal, outermost first.
    pub nested: Vec<&'a Expr>,
}

impl Expr {
    pub fn constant(v: Real) -> Self {
        Expr::Constant(v)
    }

    pub fn parameter(i: usize) -> Self {
        Expr::Parameter(i)
    }

    pub fn coordinate(axis: usize) -> Self {
        Expr::Coordinate(axis)
    }

    pub fn solution(problem: ProblemId) -> Self {
        Expr::Solution(problem)
    }

    pub fn component(self, name: impl Into<String>) -> Self {
        Expr::Component {
            base: Box::new(self),
            name: name.into(),
        }
    }

    pub fn unary(self, op: UnaryOp) -> Self {
        Expr::Unary {
            op,
            arg: Box::new(self),
        }
    }

    pub fn binary(self, op: BinaryOp, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(self),
            rhs: Box::new(rhs),
        }
    }

    pub fn exp(self) -> Self {
        self.unary(UnaryOp::Exp)
    }

    pub fn sin(self) -> Self {
        self.unary(UnaryOp::Sin)
    }

    pub fn cos(self) -> Self {
        self.unary(UnaryOp::Cos)
    }

    pub fn sqrt(self) -> Self {
        self.unary(UnaryOp::Sqrt)
    }

    pub fn abs(self) -> Self {
        self.unary(UnaryOp::Abs)
    }

    pub fn powf(self, exponent: Expr) -> Self {
        self.binary(BinaryOp::Pow, exponent)
    }

    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Constant(_)
            | Expr::Parameter(_)
            | Expr::Time
            | Expr::Coordinate(_)
            | Expr::Solution(_) => Vec::new(),
            Expr::Component { base, .. } => vec![base.as_ref()],
            Expr::Unary { arg, .. } => vec![arg.as_ref()],
            Expr::Binary { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
        }
    }

    /// Deterministic pre-order walk over every node.
    pub fn pre_order(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }

    pub fn is_solution_terminal(&self) -> bool {
        matches!(self, Expr::Solution(_) | Expr::Component { .. })
    }

    /// Identify a problem-solution terminal. Returns `None` for ordinary nodes
    /// and for components taken of something that is not a solution.
    pub fn identify_solution(&self) -> Option<SolutionTerminal<'_>> {
        let mut names = Vec::new();
        let mut nested = Vec::new();
        let mut node = self;
        loop {
            match node {
                Expr::Solution(problem) => {
                    nested.push(node);
                    names.reverse();
                    let component = if names.is_empty() {
                        None
                    } else {
                        Some(names.join("."))
                    };
                    return Some(SolutionTerminal {
                        problem: *problem,
                        component,
                        minimal: node,
                        nested,
                    });
                }
                Expr::Component { base, name } => {
                    nested.push(node);
                    names.push(name.as_str());
                    node = base.as_ref();
                }
                _ => return None,
            }
        }
    }

    /// Problems whose solutions this expression reads, in first-reference order.
    pub fn referenced_problems(&self) -> Vec<ProblemId> {
        let mut out = Vec::new();
        for node in self.pre_order() {
            if let Expr::Solution(p) = node {
                if !out.contains(p) {
                    out.push(*p);
                }
            }
        }
        out
    }
}

pub struct PreOrder<'a> {
    stack: Vec<&'a Expr>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a Expr;

    fn next(&mut self) -> Option<&'a Expr> {
        let node = self.stack.pop()?;
        match node {
            Expr::Component { base, .. } => self.stack.push(base),
            Expr::Unary { arg, .. } => self.stack.push(arg),
            Expr::Binary { lhs, rhs, .. } => {
                self.stack.push(rhs);
                self.stack.push(lhs);
            }
            _ => {}
        }
        Some(node)
    }
}

impl From<Real> for Expr {
    fn from(v: Real) -> Self {
        Expr::Constant(v)
    }
}

macro_rules! impl_binary {
    ($trait:ident, $method:ident, $op:expr) => {
        impl ops::$trait for Expr {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                self.binary($op, rhs)
            }
        }

        impl ops::$trait<Real> for Expr {
            type Output = Expr;

            fn $method(self, rhs: Real) -> Expr {
                self.binary($op, Expr::Constant(rhs))
            }
        }
    };
}

impl_binary!(Add, add, BinaryOp::Add);
impl_binary!(Sub, sub, BinaryOp::Sub);
impl_binary!(Mul, mul, BinaryOp::Mul);
impl_binary!(Div, div, BinaryOp::Div);

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        self.unary(UnaryOp::Neg)
    }
}

/// An expression with a stable name (its cache identity) and the space it is
/// interpolated onto.
#[derive(Clone, Debug, PartialEq)]
pub struct ParametrizedExpression {
    pub name: String,
    pub expr: Expr,
    pub space: FunctionSpace,
}

impl ParametrizedExpression {
    pub fn new(name: impl Into<String>, expr: Expr, space: FunctionSpace) -> Self {
        Self {
            name: name.into(),
            expr,
            space,
        }
    }
}
