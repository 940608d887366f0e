//! The edel front end: a pest grammar over the source text, and the
//! builders that turn the parse tree into AST nodes. Binary expressions
//! are shaped by precedence climbing over the operator info table.

use crate::ast::*;
use crate::operators::binary_info;
use pest::iterators::Pair;
use pest::Parser;
use util::{Failed, Location, Message, MessageList, PhaseResult};

#[derive(Parser)]
#[grammar = "edel.pest"]
pub struct EdelParser;

fn location(path: &str, pair: &Pair<Rule>) -> Location {
    let (line, col) = pair.as_span().start_pos().line_col();
    Location::at(path, line as i32 - 1).with_column(col as i32 - 1)
}

/// Parse a whole compilation unit into top-level AST nodes.
pub fn parse_program(
    path: &str,
    source: &str,
    messages: &mut MessageList,
) -> PhaseResult<Vec<Node>> {
    let mut pairs = match EdelParser::parse(Rule::program, source) {
        Ok(pairs) => pairs,
        Err(err) => {
            let loc = match err.line_col {
                pest::error::LineColLocation::Pos((line, col)) => {
                    Location::at(path, line as i32 - 1).with_column(col as i32 - 1)
                }
                pest::error::LineColLocation::Span((line, col), _) => {
                    Location::at(path, line as i32 - 1).with_column(col as i32 - 1)
                }
            };
            messages.add(Message::error(loc, format!("{}", err.variant.message())));
            return Err(Failed);
        }
    };

    let program = pairs.next().expect("no program pair");
    let mut nodes = Vec::new();
    for pair in program.into_inner() {
        if pair.as_rule() == Rule::stmt {
            nodes.push(build_stmt(path, pair, messages)?);
        }
    }
    Ok(nodes)
}

/// Combine two operands under a binary operator symbol.
fn combine(symbol: &str, loc: Location, lhs: Node, rhs: Node) -> Node {
    let base = Base::new(loc);
    match symbol {
        "=" => Node::Assign(AssignNode {
            base,
            args: vec![lhs, rhs],
        }),
        "&&" => Node::Lazy(LazyNode {
            base,
            and: true,
            args: vec![lhs, rhs],
            id: 0,
        }),
        "||" => Node::Lazy(LazyNode {
            base,
            and: false,
            args: vec![lhs, rhs],
            id: 0,
        }),
        _ => Node::Binary(BinaryNode {
            base,
            symbol: symbol.to_string(),
            args: vec![lhs, rhs],
            op: None,
            pointer_op: false,
        }),
    }
}

/// Precedence climbing over the flattened `term (op term)*` sequence,
/// driven by the per-symbol info table.
fn climb_terms(
    lhs: Node,
    rest: &mut std::iter::Peekable<std::vec::IntoIter<(String, Location, Node)>>,
    min_precedence: u8,
) -> Node {
    let mut lhs = lhs;
    while let Some((symbol, _, _)) = rest.peek() {
        let info = match binary_info(symbol) {
            Some(info) => info,
            None => break,
        };
        if info.precedence < min_precedence {
            break;
        }

        let (symbol, loc, mut rhs) = rest.next().unwrap();
        let next_min = if info.right_assoc {
            info.precedence
        } else {
            info.precedence + 1
        };
        rhs = climb_terms(rhs, rest, next_min);
        lhs = combine(&symbol, loc, lhs, rhs);
    }
    lhs
}

fn build_stmt(path: &str, pair: Pair<Rule>, messages: &mut MessageList) -> PhaseResult<Node> {
    let inner = pair.into_inner().next().expect("empty statement");
    let loc = location(path, &inner);

    match inner.as_rule() {
        Rule::let_stmt => build_let(path, inner, false, messages),
        Rule::const_stmt => build_let(path, inner, true, messages),
        Rule::return_stmt => {
            let expr = match inner.into_inner().next() {
                Some(expr) => Some(Box::new(build_expr(path, expr, messages)?)),
                None => None,
            };
            Ok(Node::Return(ReturnNode {
                base: Base::new(loc),
                expr,
                return_type: None,
            }))
        }
        Rule::break_stmt => Ok(Node::LoopControl(LoopControlNode {
            base: Base::new(loc),
            is_break: true,
        })),
        Rule::continue_stmt => Ok(Node::LoopControl(LoopControlNode {
            base: Base::new(loc),
            is_break: false,
        })),
        Rule::while_stmt => {
            let mut parts = inner.into_inner();
            let guard = build_expr(path, parts.next().expect("while guard"), messages)?;
            let body = build_block(path, parts.next().expect("while body"), messages)?;
            Ok(Node::While(WhileNode {
                base: Base::new(loc),
                guard: Box::new(guard),
                body: Box::new(body),
                id: 0,
            }))
        }
        Rule::loop_stmt => {
            let body = build_block(
                path,
                inner.into_inner().next().expect("loop body"),
                messages,
            )?;
            Ok(Node::Loop(LoopNode {
                base: Base::new(loc),
                body: Box::new(body),
                id: 0,
            }))
        }
        Rule::if_stmt => build_if(path, inner, messages),
        Rule::block => build_block(path, inner, messages),
        Rule::expr_stmt => build_expr(
            path,
            inner.into_inner().next().expect("empty expression"),
            messages,
        ),
        Rule::namespace_def => {
            let mut parts = inner.into_inner();
            let name = parts.next().expect("namespace name").as_str().to_string();
            let mut stmts = Vec::new();
            for stmt in parts {
                stmts.push(build_stmt(path, stmt, messages)?);
            }
            Ok(Node::Namespace(NamespaceNode {
                base: Base::new(loc),
                name,
                stmts,
                id: None,
            }))
        }
        Rule::func_def => build_function(path, inner, messages),
        other => unreachable!("unexpected statement rule {:?}", other),
    }
}

fn build_let(
    path: &str,
    pair: Pair<Rule>,
    constant: bool,
    messages: &mut MessageList,
) -> PhaseResult<Node> {
    let loc = location(path, &pair);
    let mut parts = pair.into_inner();
    let name = parts.next().expect("binding name").as_str().to_string();

    let mut declared = None;
    let mut init = None;
    for part in parts {
        match part.as_rule() {
            Rule::type_spec => declared = Some(build_type(path, part)?),
            Rule::expr => init = Some(Box::new(build_expr(path, part, messages)?)),
            other => unreachable!("unexpected let part {:?}", other),
        }
    }

    Ok(Node::Let(LetNode {
        base: Base::new(loc),
        name,
        declared,
        init,
        constant,
        declared_type: None,
        id: None,
    }))
}

fn build_if(path: &str, pair: Pair<Rule>, messages: &mut MessageList) -> PhaseResult<Node> {
    let loc = location(path, &pair);
    let mut parts = pair.into_inner();
    let guard = build_expr(path, parts.next().expect("if guard"), messages)?;
    let then_branch = build_block(path, parts.next().expect("if body"), messages)?;
    let else_branch = match parts.next() {
        Some(else_part) => Some(Box::new(match else_part.as_rule() {
            Rule::if_stmt => build_if(path, else_part, messages)?,
            Rule::block => build_block(path, else_part, messages)?,
            other => unreachable!("unexpected else rule {:?}", other),
        })),
        None => None,
    };

    Ok(Node::If(IfNode {
        base: Base::new(loc),
        guard: Box::new(guard),
        then_branch: Box::new(then_branch),
        else_branch,
        id: 0,
    }))
}

fn build_block(path: &str, pair: Pair<Rule>, messages: &mut MessageList) -> PhaseResult<Node> {
    let loc = location(path, &pair);
    let mut stmts = Vec::new();
    for stmt in pair.into_inner() {
        stmts.push(build_stmt(path, stmt, messages)?);
    }
    Ok(Node::Block(BlockNode {
        base: Base::new(loc),
        stmts,
    }))
}

fn build_function(path: &str, pair: Pair<Rule>, messages: &mut MessageList) -> PhaseResult<Node> {
    let loc = location(path, &pair);
    let mut parts = pair.into_inner().peekable();
    let name_pair = parts.next().expect("function name");
    let name_loc = location(path, &name_pair);
    let name = name_pair.as_str().to_string();

    let mut params = Vec::new();
    if parts.peek().map(|p| p.as_rule()) == Some(Rule::param_list) {
        for param in parts.next().unwrap().into_inner() {
            let param_loc = location(path, &param);
            let mut param_parts = param.into_inner();
            let param_name = param_parts.next().expect("parameter name").as_str().to_string();
            let spec = build_type(path, param_parts.next().expect("parameter type"))?;
            params.push(Param {
                name: param_name,
                loc: param_loc,
                spec,
                type_id: None,
            });
        }
    }

    let mut ret_spec = None;
    if parts.peek().map(|p| p.as_rule()) == Some(Rule::type_spec) {
        ret_spec = Some(build_type(path, parts.next().unwrap())?);
    }

    let body = match parts.next() {
        Some(block) => Some(Box::new(build_block(path, block, messages)?)),
        None => None,
    };

    Ok(Node::Function(FunctionNode {
        base: Base::new(loc),
        name,
        name_loc,
        params,
        ret_spec,
        body,
        type_id: None,
        id: None,
        generate: true,
    }))
}

fn build_type(path: &str, pair: Pair<Rule>) -> PhaseResult<TypeExpr> {
    let inner = pair.into_inner().next().expect("empty type");
    match inner.as_rule() {
        Rule::named_type => {
            let loc = location(path, &inner);
            Ok(TypeExpr::Named(inner.as_str().to_string(), loc))
        }
        Rule::unit_type => Ok(TypeExpr::Unit),
        Rule::ptr_type => {
            let target = build_type(path, inner.into_inner().next().expect("pointee"))?;
            Ok(TypeExpr::Pointer(Box::new(target)))
        }
        Rule::array_type => {
            let mut parts = inner.into_inner();
            let element = build_type(path, parts.next().expect("element type"))?;
            let count_text = parts.next().expect("array length").as_str();
            let count = parse_int_text(count_text);
            Ok(TypeExpr::Array(Box::new(element), count))
        }
        Rule::fn_type => {
            let mut params = Vec::new();
            let mut ret = None;
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::type_list => {
                        for item in part.into_inner() {
                            params.push(build_type(path, item)?);
                        }
                    }
                    Rule::type_spec => ret = Some(Box::new(build_type(path, part)?)),
                    other => unreachable!("unexpected fn type part {:?}", other),
                }
            }
            Ok(TypeExpr::Function(params, ret))
        }
        other => unreachable!("unexpected type rule {:?}", other),
    }
}

fn parse_int_text(text: &str) -> u64 {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    if let Some(hex) = cleaned.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).unwrap_or(0)
    } else if let Some(bin) = cleaned.strip_prefix("0b") {
        u64::from_str_radix(bin, 2).unwrap_or(0)
    } else if let Some(oct) = cleaned.strip_prefix("0o") {
        u64::from_str_radix(oct, 8).unwrap_or(0)
    } else {
        cleaned.parse().unwrap_or(0)
    }
}

fn build_expr(path: &str, pair: Pair<Rule>, messages: &mut MessageList) -> PhaseResult<Node> {
    let mut inner = pair.into_inner();
    let first = build_term(path, inner.next().expect("expression without a term"), messages)?;

    // flatten the "op term" tail, then climb by precedence
    let mut rest: Vec<(String, Location, Node)> = Vec::new();
    while let Some(op) = inner.next() {
        let op_loc = location(path, &op);
        let symbol = op.as_str().to_string();
        let term = build_term(path, inner.next().expect("operator without operand"), messages)?;
        rest.push((symbol, op_loc, term));
    }

    let mut rest = rest.into_iter().peekable();
    Ok(climb_terms(first, &mut rest, 0))
}

fn build_term(path: &str, pair: Pair<Rule>, messages: &mut MessageList) -> PhaseResult<Node> {
    let mut prefixes: Vec<(String, Location)> = Vec::new();
    let mut node: Option<Node> = None;

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::prefix_op => {
                prefixes.push((part.as_str().to_string(), location(path, &part)));
            }
            Rule::primary => {
                node = Some(build_primary(path, part, messages)?);
            }
            Rule::postfix => {
                let subject = node.take().expect("postfix before primary");
                node = Some(build_postfix(path, part, subject, messages)?);
            }
            other => unreachable!("unexpected term part {:?}", other),
        }
    }

    let mut node = node.expect("term without primary");

    // prefixes apply innermost-first
    for (symbol, loc) in prefixes.into_iter().rev() {
        let base = Base::new(loc);
        node = match symbol.as_str() {
            "&" => Node::AddressOf(AddressOfNode {
                base,
                operand: Box::new(node),
            }),
            "*" => Node::Deref(DerefNode {
                base,
                operand: Box::new(node),
            }),
            _ => Node::Unary(UnaryNode {
                base,
                symbol,
                operand: Box::new(node),
                op: None,
            }),
        };
    }
    Ok(node)
}

fn build_postfix(
    path: &str,
    pair: Pair<Rule>,
    subject: Node,
    messages: &mut MessageList,
) -> PhaseResult<Node> {
    let inner = pair.into_inner().next().expect("empty postfix");
    let loc = location(path, &inner);
    match inner.as_rule() {
        Rule::call_args => {
            let mut args = Vec::new();
            if let Some(list) = inner.into_inner().next() {
                for arg in list.into_inner() {
                    args.push(build_expr(path, arg, messages)?);
                }
            }
            Ok(Node::Call(CallNode {
                base: Base::new(loc),
                subject: Box::new(subject),
                args,
                signature: None,
                symbol: None,
            }))
        }
        Rule::subscript => {
            let index = build_expr(
                path,
                inner.into_inner().next().expect("subscript index"),
                messages,
            )?;
            Ok(Node::Subscript(SubscriptNode {
                base: Base::new(loc),
                args: vec![subject, index],
                op: None,
            }))
        }
        Rule::cast_suffix => {
            let spec = build_type(path, inner.into_inner().next().expect("cast target"))?;
            Ok(Node::Cast(CastNode {
                base: Base::new(loc),
                operand: Box::new(subject),
                spec,
                target: None,
                sudo: false,
            }))
        }
        Rule::dot_suffix => {
            let property = inner
                .into_inner()
                .next()
                .expect("property name")
                .as_str()
                .to_string();
            Ok(Node::Dot(DotNode {
                base: Base::new(loc),
                lhs: Box::new(subject),
                property,
            }))
        }
        other => unreachable!("unexpected postfix rule {:?}", other),
    }
}

fn build_primary(
    path: &str,
    pair: Pair<Rule>,
    messages: &mut MessageList,
) -> PhaseResult<Node> {
    let inner = pair.into_inner().next().expect("empty primary");
    let loc = location(path, &inner);

    match inner.as_rule() {
        Rule::sizeof_expr => {
            let operand = build_expr(
                path,
                inner.into_inner().next().expect("sizeof operand"),
                messages,
            )?;
            Ok(Node::SizeOf(SizeOfNode {
                base: Base::new(loc),
                operand: Box::new(operand),
            }))
        }
        Rule::array_lit => {
            let mut elements = Vec::new();
            if let Some(list) = inner.into_inner().next() {
                for element in list.into_inner() {
                    elements.push(build_expr(path, element, messages)?);
                }
            }
            Ok(Node::ArrayLiteral(ArrayLiteralNode {
                base: Base::new(loc),
                elements,
            }))
        }
        Rule::float_lit => {
            let text = inner.as_str().to_string();
            let cleaned: String = text.chars().filter(|c| *c != '_').collect();
            let value: f64 = cleaned.parse().unwrap_or(0.0);
            Ok(Node::Literal(LiteralNode {
                base: Base::new(loc),
                source: LiteralSource::Float(value, text),
            }))
        }
        Rule::int_lit => {
            let text = inner.as_str().to_string();
            Ok(Node::Literal(LiteralNode {
                base: Base::new(loc),
                source: LiteralSource::Int(parse_int_text(&text), text),
            }))
        }
        Rule::bool_lit => Ok(Node::Literal(LiteralNode {
            base: Base::new(loc),
            source: LiteralSource::Bool(inner.as_str() == "true"),
        })),
        Rule::char_lit => {
            let text = inner.as_str();
            let body = &text[1..text.len() - 1];
            let value = decode_char(body);
            Ok(Node::Literal(LiteralNode {
                base: Base::new(loc),
                source: LiteralSource::Char(value),
            }))
        }
        Rule::ident => Ok(Node::SymbolRef(SymbolRefNode {
            base: Base::new(loc),
            name: inner.as_str().to_string(),
        })),
        Rule::paren => build_expr(
            path,
            inner.into_inner().next().expect("empty parentheses"),
            messages,
        ),
        other => unreachable!("unexpected primary rule {:?}", other),
    }
}

fn decode_char(body: &str) -> u8 {
    let bytes = body.as_bytes();
    if bytes.len() >= 2 && bytes[0] == b'\\' {
        match bytes[1] {
            b'n' => 0x0a,
            b't' => 0x09,
            b'r' => 0x0d,
            b'0' => 0x00,
            b'\\' => 0x5c,
            b'\'' => 0x27,
            other => other,
        }
    } else {
        bytes.first().copied().unwrap_or(0)
    }
}
