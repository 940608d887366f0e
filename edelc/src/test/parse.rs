use crate::ast::Node;
use crate::parser::parse_program;
use matches::assert_matches;
use util::MessageList;

fn parse(source: &str) -> Vec<Node> {
    let mut messages = MessageList::new();
    parse_program("test.edel", source, &mut messages).expect("parse failed")
}

#[test]
fn let_statement_shapes() {
    let nodes = parse("let x: i32 = 5;\nlet y = 1;\nlet z: u8;\nconst c: i64 = 2;");
    assert_eq!(nodes.len(), 4);

    match &nodes[0] {
        Node::Let(n) => {
            assert_eq!(n.name, "x");
            assert!(n.declared.is_some());
            assert!(n.init.is_some());
            assert!(!n.constant);
        }
        _ => panic!("expected let"),
    }
    match &nodes[1] {
        Node::Let(n) => assert!(n.declared.is_none()),
        _ => panic!("expected let"),
    }
    match &nodes[2] {
        Node::Let(n) => assert!(n.init.is_none()),
        _ => panic!("expected let"),
    }
    match &nodes[3] {
        Node::Let(n) => assert!(n.constant),
        _ => panic!("expected const"),
    }
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let nodes = parse("let x = 1 + 2 * 3;");
    let init = match &nodes[0] {
        Node::Let(n) => n.init.as_ref().unwrap(),
        _ => panic!("expected let"),
    };
    match &**init {
        Node::Binary(add) => {
            assert_eq!(add.symbol, "+");
            match &add.args[1] {
                Node::Binary(mul) => assert_eq!(mul.symbol, "*"),
                _ => panic!("expected rhs to be a product"),
            }
        }
        _ => panic!("expected a sum"),
    }
}

#[test]
fn comparison_binds_looser_than_shift() {
    let nodes = parse("let x = 1 << 2 < 3;");
    let init = match &nodes[0] {
        Node::Let(n) => n.init.as_ref().unwrap(),
        _ => panic!("expected let"),
    };
    match &**init {
        Node::Binary(cmp) => {
            assert_eq!(cmp.symbol, "<");
            match &cmp.args[0] {
                Node::Binary(shift) => assert_eq!(shift.symbol, "<<"),
                _ => panic!("expected lhs to be a shift"),
            }
        }
        _ => panic!("expected a comparison"),
    }
}

#[test]
fn assignment_is_right_associative() {
    let nodes = parse("a = b = 1;");
    match &nodes[0] {
        Node::Assign(outer) => match &outer.args[1] {
            Node::Assign(_) => {}
            _ => panic!("expected nested assignment on the right"),
        },
        _ => panic!("expected assignment"),
    }
}

#[test]
fn lazy_operators_build_dedicated_nodes() {
    let nodes = parse("let x = a && b || c;");
    let init = match &nodes[0] {
        Node::Let(n) => n.init.as_ref().unwrap(),
        _ => panic!("expected let"),
    };
    match &**init {
        Node::Lazy(or) => {
            assert!(!or.and);
            match &or.args[0] {
                Node::Lazy(and) => assert!(and.and),
                _ => panic!("expected && under ||"),
            }
        }
        _ => panic!("expected lazy operator"),
    }
}

#[test]
fn postfix_chain() {
    let nodes = parse("let x = table[1].length as i32;");
    let init = match &nodes[0] {
        Node::Let(n) => n.init.as_ref().unwrap(),
        _ => panic!("expected let"),
    };
    match &**init {
        Node::Cast(cast) => match &*cast.operand {
            Node::Dot(dot) => {
                assert_eq!(dot.property, "length");
                match &*dot.lhs {
                    Node::Subscript(_) => {}
                    _ => panic!("expected subscript under dot"),
                }
            }
            _ => panic!("expected dot under cast"),
        },
        _ => panic!("expected cast"),
    }
}

#[test]
fn unary_prefixes_nest_innermost_first() {
    let nodes = parse("let x = -*p;");
    let init = match &nodes[0] {
        Node::Let(n) => n.init.as_ref().unwrap(),
        _ => panic!("expected let"),
    };
    match &**init {
        Node::Unary(neg) => {
            assert_eq!(neg.symbol, "-");
            match &*neg.operand {
                Node::Deref(_) => {}
                _ => panic!("expected dereference under negation"),
            }
        }
        _ => panic!("expected unary"),
    }
}

#[test]
fn function_definition_and_declaration() {
    let nodes = parse("fn add(a: i64, b: i64) -> i64 { return a + b; }\nfn helper();");
    match &nodes[0] {
        Node::Function(f) => {
            assert_eq!(f.name, "add");
            assert_eq!(f.params.len(), 2);
            assert!(f.body.is_some());
        }
        _ => panic!("expected function"),
    }
    match &nodes[1] {
        Node::Function(f) => {
            assert_eq!(f.name, "helper");
            assert!(f.body.is_none());
        }
        _ => panic!("expected declaration"),
    }
}

#[test]
fn if_else_chains() {
    let nodes = parse("if a { } else if b { } else { }");
    match &nodes[0] {
        Node::If(first) => match first.else_branch.as_deref() {
            Some(Node::If(second)) => assert!(second.else_branch.is_some()),
            _ => panic!("expected else-if chain"),
        },
        _ => panic!("expected if"),
    }
}

#[test]
fn literal_forms() {
    let nodes = parse("let a = 0xFF; let b = 0b101; let c = 2.5; let d = true; let e = 'A';");
    use crate::ast::LiteralSource;
    let literal = |node: &Node| -> LiteralSource {
        match node {
            Node::Let(n) => match n.init.as_deref() {
                Some(Node::Literal(l)) => l.source.clone(),
                _ => panic!("expected literal initialiser"),
            },
            _ => panic!("expected let"),
        }
    };
    assert_matches!(literal(&nodes[0]), LiteralSource::Int(0xFF, _));
    assert_matches!(literal(&nodes[1]), LiteralSource::Int(5, _));
    assert_matches!(literal(&nodes[2]), LiteralSource::Float(f, _) if f == 2.5);
    assert_matches!(literal(&nodes[3]), LiteralSource::Bool(true));
    assert_matches!(literal(&nodes[4]), LiteralSource::Char(65));
}

#[test]
fn type_spellings() {
    let nodes = parse("let a: *u8; let b: [i32; 4]; let c: fn(u8) -> bool; let d: ();");
    use crate::ast::TypeExpr;
    let spec = |node: &Node| -> TypeExpr {
        match node {
            Node::Let(n) => n.declared.clone().unwrap(),
            _ => panic!("expected let"),
        }
    };
    assert_matches!(spec(&nodes[0]), TypeExpr::Pointer(_));
    assert_matches!(spec(&nodes[1]), TypeExpr::Array(_, 4));
    assert_matches!(spec(&nodes[2]), TypeExpr::Function(_, Some(_)));
    assert_matches!(spec(&nodes[3]), TypeExpr::Unit);
}

#[test]
fn syntax_errors_report_a_location() {
    let mut messages = MessageList::new();
    let result = parse_program("test.edel", "let = 5;", &mut messages);
    assert!(result.is_err());
    assert!(messages.has_error());
    let error = messages.iter().next().unwrap();
    assert!(error.location().is_some());
}
