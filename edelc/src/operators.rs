//! The operator registry and overload resolution.
//!
//! Operators are either built in (carrying a code-generating function) or
//! user defined (backed by a function symbol). Resolution scores each
//! arity-matching candidate by its number of exact type matches,
//! disqualifying candidates whose remaining slots are not supertypes; a
//! perfect score wins immediately, a tie is an ambiguity error.

use crate::symbols::SymbolId;
use crate::types::{TypeGraph, TypeId};
use eisa::ConditionFlag;
use util::{Failed, Location, Message, MessageList, PhaseResult};

pub type OperatorId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitOp {
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Mod,
}

/// What an operator does when invoked. The builtin variants are a closed
/// set; each carries the data its generator needs.
#[derive(Clone, Copy, Debug)]
pub enum OperatorKind {
    /// Datatyped ALU arithmetic.
    Arith { op: ArithOp, operand: TypeId },
    /// Untyped ALU bit operations (shifts, masks, modulo).
    Bitwise { op: BitOp },
    /// Comparison returning bool; fuses with a conditional context.
    Relational {
        operand: TypeId,
        flag: ConditionFlag,
    },
    /// Boolean equality via xor; `negate` distinguishes `==` from `!=`.
    BoolEq { negate: bool },
    /// Unary arithmetic negation.
    Negate { operand: TypeId },
    /// Boolean negation; propagates an inverted conditional context.
    BooleanNot,
    /// Unary bitwise complement.
    BitwiseNot,
    /// Short-circuiting `&&`/`||`; the AST lowers these through blocks,
    /// the eager fallback is a plain mask.
    Lazy { and: bool },
    UserDefined(SymbolId),
}

pub struct Operator {
    pub id: OperatorId,
    pub symbol: String,
    /// Function type describing the signature.
    pub type_id: TypeId,
    pub kind: OperatorKind,
}

#[derive(Default)]
pub struct OperatorRegistry {
    ops: Vec<Operator>,
}

impl OperatorRegistry {
    pub fn new() -> OperatorRegistry {
        OperatorRegistry::default()
    }

    pub fn register(&mut self, symbol: impl Into<String>, type_id: TypeId, kind: OperatorKind) {
        let id = self.ops.len();
        self.ops.push(Operator {
            id,
            symbol: symbol.into(),
            type_id,
            kind,
        });
    }

    pub fn get(&self, id: OperatorId) -> &Operator {
        &self.ops[id]
    }

    /// Ids of every operator spelled `symbol`, in registration order.
    pub fn matching(&self, symbol: &str) -> Vec<OperatorId> {
        self.ops
            .iter()
            .filter(|op| op.symbol == symbol)
            .map(|op| op.id)
            .collect()
    }

    pub fn spelling(&self, types: &TypeGraph, id: OperatorId) -> String {
        let op = self.get(id);
        format!("operator{}{}", op.symbol, types.name(op.type_id))
    }
}

/// Outcome of scoring a candidate list against an argument type list.
pub enum Selection {
    Selected(usize),
    NoMatch,
    Ambiguous(Vec<usize>),
}

/// Score-based overload selection shared by operators and function calls.
/// `candidates` are function type ids; the return is an index into it.
pub fn select_overload(
    types: &TypeGraph,
    arg_types: &[TypeId],
    candidates: &[TypeId],
) -> Selection {
    let mut viable: Vec<(usize, usize)> = Vec::new(); // (index, score)
    let mut best = 0usize;

    'candidates: for (index, candidate) in candidates.iter().enumerate() {
        let (params, _) = match types.function_parts(*candidate) {
            Some(parts) => parts,
            None => continue,
        };
        if params.len() != arg_types.len() {
            continue;
        }

        let mut score = 0usize;
        for (arg, param) in arg_types.iter().zip(params.iter()) {
            if arg == param {
                score += 1;
            } else if !types.is_subtype(*arg, *param) {
                continue 'candidates;
            }
        }

        // all slots exact: unambiguously this candidate
        if score == arg_types.len() {
            return Selection::Selected(index);
        }

        best = best.max(score);
        viable.push((index, score));
    }

    let tied: Vec<usize> = viable
        .into_iter()
        .filter(|(_, score)| *score == best)
        .map(|(index, _)| index)
        .collect();

    match tied.len() {
        0 => Selection::NoMatch,
        1 => Selection::Selected(tied[0]),
        _ => Selection::Ambiguous(tied),
    }
}

/// Resolve an operator application to a single registered operator,
/// reporting candidates on failure.
pub fn select_candidate(
    registry: &OperatorRegistry,
    types: &TypeGraph,
    symbol: &str,
    arg_types: &[TypeId],
    loc: &Location,
    messages: &mut MessageList,
) -> PhaseResult<OperatorId> {
    let options = registry.matching(symbol);
    let candidate_types: Vec<TypeId> = options.iter().map(|id| registry.get(*id).type_id).collect();

    let (failed, tied) = match select_overload(types, arg_types, &candidate_types) {
        Selection::Selected(index) => return Ok(options[index]),
        Selection::NoMatch => (true, Vec::new()),
        Selection::Ambiguous(tied) => (false, tied),
    };

    let spelled: Vec<String> = arg_types.iter().map(|t| types.name(*t)).collect();
    messages.add(Message::error(
        loc.copy(),
        format!(
            "unable to resolve a suitable candidate for operator{}({})",
            symbol,
            spelled.join(", ")
        ),
    ));

    let listed: Vec<OperatorId> = if failed {
        options
    } else {
        tied.into_iter().map(|index| options[index]).collect()
    };
    for id in listed {
        messages.add(Message::new(
            util::Level::Note,
            format!("candidate: {}", registry.spelling(types, id)),
        ));
    }

    Err(Failed)
}

/// Parser-facing operator properties: precedence and unary marker. The
/// precedence values are stable compatibility contracts.
pub struct OperatorInfo {
    pub precedence: u8,
    pub right_assoc: bool,
}

pub fn binary_info(symbol: &str) -> Option<OperatorInfo> {
    let (precedence, right_assoc) = match symbol {
        "=" => (1, true),
        "||" => (7, false),
        "&&" => (8, false),
        "|" => (9, false),
        "^" => (10, false),
        "&" => (11, false),
        "==" | "!=" | "<" | "<=" | ">" | ">=" => (12, false),
        ">>" | "<<" => (13, false),
        "+" | "-" => (14, false),
        "*" | "/" | "%" => (15, false),
        "." => (20, false),
        _ => return None,
    };
    Some(OperatorInfo {
        precedence,
        right_assoc,
    })
}

pub fn unary_info(symbol: &str) -> Option<OperatorInfo> {
    match symbol {
        "-" | "!" | "~" => Some(OperatorInfo {
            precedence: 14,
            right_assoc: true,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::builtins;
    use crate::types::{self, TypeGraph};

    fn setup() -> (OperatorRegistry, TypeGraph) {
        let mut registry = OperatorRegistry::new();
        let mut graph = TypeGraph::new();
        builtins::init_builtins(&mut registry, &mut graph);
        (registry, graph)
    }

    fn resolve(
        registry: &OperatorRegistry,
        graph: &TypeGraph,
        symbol: &str,
        args: &[TypeId],
    ) -> PhaseResult<OperatorId> {
        let mut messages = MessageList::new();
        select_candidate(
            registry,
            graph,
            symbol,
            args,
            &Location::at("t.edel", 0),
            &mut messages,
        )
    }

    #[test]
    fn exact_match_selects_immediately() {
        let (registry, graph) = setup();
        let op = resolve(&registry, &graph, "+", &[types::I32, types::I32]).unwrap();
        let (params, ret) = graph.function_parts(registry.get(op).type_id).unwrap();
        assert_eq!(params, &[types::I32, types::I32]);
        assert_eq!(ret, types::I32);
    }

    #[test]
    fn resolution_is_deterministic() {
        let (registry, graph) = setup();
        let first = resolve(&registry, &graph, "*", &[types::U64, types::U64]).unwrap();
        for _ in 0..10 {
            let again = resolve(&registry, &graph, "*", &[types::U64, types::U64]).unwrap();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn subtyped_arguments_find_a_wider_overload() {
        let (registry, graph) = setup();
        // u8 + i64 has no exact overload; widening picks (i64, i64)
        let op = resolve(&registry, &graph, "+", &[types::U8, types::I64]).unwrap();
        let (params, _) = graph.function_parts(registry.get(op).type_id).unwrap();
        assert_eq!(params, &[types::I64, types::I64]);
    }

    #[test]
    fn unrelated_types_do_not_resolve() {
        let (registry, mut graph) = setup();
        let ptr = graph.pointer_to(types::U8);
        let mut messages = MessageList::new();
        let result = select_candidate(
            &registry,
            &graph,
            "+",
            &[ptr, ptr],
            &Location::at("t.edel", 0),
            &mut messages,
        );
        assert!(result.is_err());
        assert!(messages.has_error());
        // candidates are listed as notes
        assert!(messages.iter().any(|m| m.text().starts_with("candidate:")));
    }

    #[test]
    fn modulo_has_its_single_signature() {
        let (registry, graph) = setup();
        let op = resolve(&registry, &graph, "%", &[types::U64, types::I32]).unwrap();
        let (_, ret) = graph.function_parts(registry.get(op).type_id).unwrap();
        assert_eq!(ret, types::I64);
    }

    #[test]
    fn relational_returns_bool() {
        let (registry, graph) = setup();
        let op = resolve(&registry, &graph, "<", &[types::F32, types::F32]).unwrap();
        let (_, ret) = graph.function_parts(registry.get(op).type_id).unwrap();
        assert_eq!(ret, types::BOOL);
        assert!(matches!(
            registry.get(op).kind,
            OperatorKind::Relational { .. }
        ));
    }

    #[test]
    fn precedence_table_is_stable() {
        assert_eq!(binary_info("=").unwrap().precedence, 1);
        assert!(binary_info("=").unwrap().right_assoc);
        assert_eq!(binary_info("||").unwrap().precedence, 7);
        assert_eq!(binary_info("&&").unwrap().precedence, 8);
        assert_eq!(binary_info("==").unwrap().precedence, 12);
        assert_eq!(binary_info("<<").unwrap().precedence, 13);
        assert_eq!(binary_info("+").unwrap().precedence, 14);
        assert_eq!(binary_info("*").unwrap().precedence, 15);
        assert_eq!(binary_info(".").unwrap().precedence, 20);
        assert_eq!(unary_info("!").unwrap().precedence, 14);
    }
}
