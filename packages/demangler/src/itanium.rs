use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::node::{CtorKind, DtorKind, Qualifier};
use crate::{Cursor, Node};

/// Decode an Itanium ABI mangled symbol (the `_Z`/`__Z` scheme used by GCC
/// and Clang).
///
/// Returns `Ok(None)` when the input is not a well-formed mangled name, and
/// `Err` when it uses a recognized construct this decoder rejects (local
/// names, unnamed and closure types, expressions, `decltype`, covariant
/// thunks, extended temporaries).
pub fn demangle_itanium(raw: &str) -> cu::Result<Option<Node>> {
    let mut cursor = Cursor::new(raw);
    let Some(ast) = parse_mangled_name(&mut cursor)? else {
        return Ok(None);
    };
    Ok(Some(expand_arg_packs(&ast)))
}

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+").unwrap());

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:",
        r"(?P<ctor_name>C[123])|",
        r"(?P<dtor_name>D[012])|",
        r"(?P<std_name>S[absiod])|",
        r"(?P<operator_name>nw|na|dl|da|ps|ng|ad|de|co|pl|mi|ml|dv|rm|an|or|",
        r"eo|aS|pL|mI|mL|dV|rM|aN|oR|eO|ls|rs|lS|rS|eq|ne|",
        r"lt|gt|le|ge|nt|aa|oo|pp|mm|cm|pm|pt|cl|ix|qu)|",
        r"(?P<operator_cv>cv)|",
        r"(?P<std_prefix>St)|",
        r"(?P<substitution>S)|",
        r"(?P<nested_name>N(?P<cv_qual>[rVK]*)(?P<ref_qual>[RO]?))|",
        r"(?P<template_param>T)|",
        r"(?P<template_args>I)|",
        r"(?P<constant>L)|",
        r"(?P<local_name>Z)|",
        r"(?P<unnamed_type>Ut)|",
        r"(?P<closure_type>Ul)",
        r")",
    ))
    .unwrap()
});

static TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:",
        r"(?P<builtin_type>v|w|b|c|a|h|s|t|i|j|l|m|x|y|n|o|f|d|e|g|z|",
        r"Dd|De|Df|Dh|Di|Ds|Da|Dn)|",
        r"(?P<qualified_type>[rVK]+)|",
        r"(?P<indirect_type>[PRO])|",
        r"(?P<function_type>F)|",
        r"(?P<expression>X)|",
        r"(?P<template_arg_pack>J)|",
        r"(?P<arg_pack_expansion>Dp)|",
        r"(?P<decltype>D[tT])|",
        r"(?P<array_type>A)|",
        r"(?P<member_type>M)",
        r")",
    ))
    .unwrap()
});

static SPECIAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:",
        r"(?P<rtti>T(?P<rtti_kind>[VTIS]))|",
        r"(?P<nonvirtual_thunk>Th(?P<nv_offset>n?\d+)_)|",
        r"(?P<virtual_thunk>Tv(?P<v_offset>n?\d+)_(?P<vcall_offset>n?\d+)_)|",
        r"(?P<covariant_thunk>Tc)|",
        r"(?P<guard_variable>GV)|",
        r"(?P<extended_temporary>GR)|",
        r"(?P<transaction_clone>GTt)",
        r")",
    ))
    .unwrap()
});

fn std_shorthand(code: &str) -> Option<Node> {
    let name = match code {
        "Sa" => "allocator",
        "Sb" => "basic_string",
        "Ss" => "string",
        "Si" => "istream",
        "So" => "ostream",
        "Sd" => "iostream",
        _ => return None,
    };
    Some(Node::QualName(vec![Node::name("std"), Node::name(name)]))
}

fn operator_symbol(code: &str) -> Option<&'static str> {
    Some(match code {
        "nw" => "new",
        "na" => "new[]",
        "dl" => "delete",
        "da" => "delete[]",
        "ps" => "+",
        "ng" => "-",
        "ad" => "&",
        "de" => "*",
        "co" => "~",
        "pl" => "+",
        "mi" => "-",
        "ml" => "*",
        "dv" => "/",
        "rm" => "%",
        "an" => "&",
        "or" => "|",
        "eo" => "^",
        "aS" => "=",
        "pL" => "+=",
        "mI" => "-=",
        "mL" => "*=",
        "dV" => "/=",
        "rM" => "%=",
        "aN" => "&=",
        "oR" => "|=",
        "eO" => "^=",
        "ls" => "<<",
        "rs" => ">>",
        "lS" => "<<=",
        "rS" => ">>=",
        "eq" => "==",
        "ne" => "!=",
        "lt" => "<",
        "gt" => ">",
        "le" => "<=",
        "ge" => ">=",
        "nt" => "!",
        "aa" => "&&",
        "oo" => "||",
        "pp" => "++",
        "mm" => "--",
        "cm" => ",",
        "pm" => "->*",
        "pt" => "->",
        "cl" => "()",
        "ix" => "[]",
        "qu" => "?",
        _ => return None,
    })
}

fn builtin_type(code: &str) -> Option<Node> {
    if code == "Dn" {
        return Some(Node::QualName(vec![
            Node::name("std"),
            Node::builtin("nullptr_t"),
        ]));
    }
    let name = match code {
        "v" => "void",
        "w" => "wchar_t",
        "b" => "bool",
        "c" => "char",
        "a" => "signed char",
        "h" => "unsigned char",
        "s" => "short",
        "t" => "unsigned short",
        "i" => "int",
        "j" => "unsigned int",
        "l" => "long",
        "m" => "unsigned long",
        "x" => "long long",
        "y" => "unsigned long long",
        "n" => "__int128",
        "o" => "unsigned __int128",
        "f" => "float",
        "d" => "double",
        "e" => "__float80",
        "g" => "__float128",
        "z" => "...",
        "Dd" => "_Decimal64",
        "De" => "_Decimal128",
        "Df" => "_Decimal32",
        "Dh" => "_Float16",
        "Di" => "char32_t",
        "Ds" => "char16_t",
        "Da" => "auto",
        _ => return None,
    };
    Some(Node::builtin(name))
}

fn wrap_cv(qualifiers: &str, node: Node) -> Node {
    let mut quals = BTreeSet::new();
    if qualifiers.contains('r') {
        quals.insert(Qualifier::Restrict);
    }
    if qualifiers.contains('V') {
        quals.insert(Qualifier::Volatile);
    }
    if qualifiers.contains('K') {
        quals.insert(Qualifier::Const);
    }
    if quals.is_empty() {
        node
    } else {
        Node::CvQual(quals, Box::new(node))
    }
}

fn wrap_indirect(qualifier: &str, node: Node) -> Node {
    match qualifier {
        "P" => Node::Pointer(Box::new(node)),
        "R" => Node::Lvalue(Box::new(node)),
        "O" => Node::Rvalue(Box::new(node)),
        _ => node,
    }
}

/// A decimal length followed by that many bytes of identifier
fn parse_source_name<'a>(cursor: &mut Cursor<'a>) -> Option<&'a str> {
    let caps = cursor.match_re(&NUMBER_RE)?;
    let len = cu::parse::<usize>(&caps[0]).ok()?;
    cursor.advance(len)
}

/// Base-36 sequence id terminated by `_`; empty means 0, otherwise the
/// value plus one
fn parse_seq_id(cursor: &mut Cursor) -> Option<usize> {
    let seq_id = cursor.advance_until("_")?;
    if seq_id.is_empty() {
        return Some(0);
    }
    usize::from_str_radix(seq_id, 36).ok().map(|n| n + 1)
}

/// Parse nodes with `f` until a terminating `E`
fn parse_node_list(
    cursor: &mut Cursor,
    f: impl Fn(&mut Cursor) -> cu::Result<Option<Node>>,
) -> cu::Result<Option<Vec<Node>>> {
    let mut nodes = Vec::new();
    while !cursor.accept("E") {
        let Some(node) = f(cursor)? else {
            return Ok(None);
        };
        if cursor.at_end() {
            return Ok(None);
        }
        nodes.push(node);
    }
    Ok(Some(nodes))
}

fn parse_name(cursor: &mut Cursor, is_nested: bool) -> cu::Result<Option<Node>> {
    let mut from_std_name = false;
    let mut from_std_prefix = false;
    let mut from_substitution = false;

    let mut node = if cursor.peek().is_some_and(|c| c.is_ascii_digit()) {
        let Some(name) = parse_source_name(cursor) else {
            return Ok(None);
        };
        Node::name(name)
    } else {
        let Some(caps) = cursor.match_re(&NAME_RE) else {
            return Ok(None);
        };
        if let Some(m) = caps.name("ctor_name") {
            Node::Ctor(match m.as_str() {
                "C1" => CtorKind::Complete,
                "C2" => CtorKind::Base,
                _ => CtorKind::Allocating,
            })
        } else if let Some(m) = caps.name("dtor_name") {
            Node::Dtor(match m.as_str() {
                "D0" => DtorKind::Deleting,
                "D1" => DtorKind::Complete,
                _ => DtorKind::Base,
            })
        } else if let Some(m) = caps.name("std_name") {
            from_std_name = true;
            let Some(node) = std_shorthand(m.as_str()) else {
                return Ok(None);
            };
            node
        } else if let Some(m) = caps.name("operator_name") {
            let Some(sym) = operator_symbol(m.as_str()) else {
                return Ok(None);
            };
            Node::Oper(sym.to_string())
        } else if caps.name("operator_cv").is_some() {
            let Some(ty) = parse_type(cursor)? else {
                return Ok(None);
            };
            Node::OperCast(Box::new(ty))
        } else if caps.name("std_prefix").is_some() {
            from_std_prefix = true;
            let Some(name) = parse_name(cursor, true)? else {
                return Ok(None);
            };
            match name {
                Node::QualName(parts) => {
                    let mut nodes = vec![Node::name("std")];
                    nodes.extend(parts);
                    Node::QualName(nodes)
                }
                other => Node::QualName(vec![Node::name("std"), other]),
            }
        } else if caps.name("substitution").is_some() {
            from_substitution = true;
            let Some(seq_id) = parse_seq_id(cursor) else {
                return Ok(None);
            };
            let Some(node) = cursor.resolve_subst(seq_id) else {
                return Ok(None);
            };
            node
        } else if caps.name("nested_name").is_some() {
            let cv_qual = caps.name("cv_qual").map(|m| m.as_str()).unwrap_or("");
            let ref_qual = caps.name("ref_qual").map(|m| m.as_str()).unwrap_or("");
            let mut parts: Vec<Node> = Vec::new();
            loop {
                let Some(name) = parse_name(cursor, true)? else {
                    return Ok(None);
                };
                if cursor.at_end() {
                    return Ok(None);
                }
                match name {
                    Node::QualName(inner) => parts.extend(inner),
                    other => parts.push(other),
                }
                if cursor.accept("E") {
                    break;
                }
                // every complete prefix becomes a substitution candidate
                cursor.add_subst(Node::QualName(parts.clone()));
            }
            let node = wrap_cv(cv_qual, Node::QualName(parts));
            wrap_indirect(ref_qual, node)
        } else if caps.name("template_param").is_some() {
            let Some(seq_id) = parse_seq_id(cursor) else {
                return Ok(None);
            };
            let node = Node::TplParam(seq_id);
            cursor.add_subst(node.clone());
            node
        } else if caps.name("template_args").is_some() {
            let Some(args) = parse_node_list(cursor, parse_type)? else {
                return Ok(None);
            };
            Node::TplArgs(args)
        } else if caps.name("constant").is_some() {
            // undocumented `L` marker, behaves as const; take the name after it
            return parse_name(cursor, is_nested);
        } else if caps.name("local_name").is_some() {
            cu::bail!("local names are not supported");
        } else if caps.name("unnamed_type").is_some() {
            cu::bail!("unnamed types are not supported");
        } else {
            cu::bail!("closure (lambda) types are not supported");
        }
    };

    let mut abi_tags = BTreeSet::new();
    while cursor.accept("B") {
        let Some(tag) = parse_source_name(cursor) else {
            return Ok(None);
        };
        abi_tags.insert(tag.to_string());
    }
    if !abi_tags.is_empty() {
        node = Node::Abi(abi_tags, Box::new(node));
    }

    if !is_nested && cursor.accept("I") {
        let simple_base = matches!(node, Node::Name(_) | Node::Oper(_) | Node::OperCast(_));
        if simple_base || from_std_prefix || from_std_name || from_substitution {
            if simple_base || from_std_prefix {
                // an unscoped template name is itself a substitution candidate
                cursor.add_subst(node.clone());
            }
            let Some(args) = parse_node_list(cursor, parse_type)? else {
                return Ok(None);
            };
            node = Node::QualName(vec![node, Node::TplArgs(args)]);
            if from_std_prefix || from_std_name {
                let base_is_operator = match &node {
                    Node::QualName(parts) => match parts.first() {
                        Some(Node::QualName(base)) => matches!(
                            base.get(1),
                            Some(Node::Oper(_)) | Some(Node::OperCast(_))
                        ),
                        _ => true,
                    },
                    _ => true,
                };
                if !base_is_operator {
                    cursor.add_subst(node.clone());
                }
            }
        }
    }

    Ok(Some(node))
}

fn parse_type(cursor: &mut Cursor) -> cu::Result<Option<Node>> {
    if cursor.starts_with("L") {
        return parse_expr_primary(cursor);
    }
    let Some(caps) = cursor.match_re(&TYPE_RE) else {
        // a bare name also names a type
        let Some(node) = parse_name(cursor, false)? else {
            return Ok(None);
        };
        cursor.add_subst(node.clone());
        return Ok(Some(node));
    };
    let node = if let Some(m) = caps.name("builtin_type") {
        let Some(node) = builtin_type(m.as_str()) else {
            return Ok(None);
        };
        node
    } else if let Some(m) = caps.name("qualified_type") {
        let Some(ty) = parse_type(cursor)? else {
            return Ok(None);
        };
        let node = wrap_cv(m.as_str(), ty);
        cursor.add_subst(node.clone());
        node
    } else if let Some(m) = caps.name("indirect_type") {
        let Some(ty) = parse_type(cursor)? else {
            return Ok(None);
        };
        let node = wrap_indirect(m.as_str(), ty);
        cursor.add_subst(node.clone());
        node
    } else if caps.name("function_type").is_some() {
        let Some(ret_ty) = parse_type(cursor)? else {
            return Ok(None);
        };
        let mut arg_tys = Vec::new();
        while !cursor.accept("E") {
            let Some(arg_ty) = parse_type(cursor)? else {
                return Ok(None);
            };
            arg_tys.push(arg_ty);
        }
        let node = Node::Func {
            name: None,
            arg_tys,
            ret_ty: Some(Box::new(ret_ty)),
        };
        cursor.add_subst(node.clone());
        node
    } else if caps.name("expression").is_some() {
        cu::bail!("expressions are not supported");
    } else if caps.name("template_arg_pack").is_some() {
        let Some(args) = parse_node_list(cursor, parse_type)? else {
            return Ok(None);
        };
        Node::TplArgPack(args)
    } else if caps.name("arg_pack_expansion").is_some() {
        let Some(ty) = parse_type(cursor)? else {
            return Ok(None);
        };
        Node::ExpandArgPack(Box::new(ty))
    } else if caps.name("decltype").is_some() {
        cu::bail!("decltype is not supported");
    } else if caps.name("array_type").is_some() {
        let Some(dim_caps) = cursor.match_re(&NUMBER_RE) else {
            return Ok(None);
        };
        let Some(dimension) = cu::parse::<u64>(&dim_caps[0]).ok() else {
            return Ok(None);
        };
        if !cursor.accept("_") {
            return Ok(None);
        }
        let Some(ty) = parse_type(cursor)? else {
            return Ok(None);
        };
        let node = Node::Array {
            dimension: Box::new(Node::Literal {
                value: dimension.to_string(),
                ty: Box::new(Node::builtin("int")),
            }),
            ty: Box::new(ty),
        };
        cursor.add_subst(node.clone());
        node
    } else {
        // member_type
        let Some(cls_ty) = parse_type(cursor)? else {
            return Ok(None);
        };
        let Some(member_ty) = parse_type(cursor)? else {
            return Ok(None);
        };
        if matches!(member_ty, Node::Func { .. }) {
            Node::MethodMember {
                cls_ty: Box::new(cls_ty),
                member_ty: Box::new(member_ty),
            }
        } else {
            Node::DataMember {
                cls_ty: Box::new(cls_ty),
                member_ty: Box::new(member_ty),
            }
        }
    };
    Ok(Some(node))
}

/// `L`-prefixed primary: a nested mangled name or a typed literal
fn parse_expr_primary(cursor: &mut Cursor) -> cu::Result<Option<Node>> {
    if !cursor.accept("L") {
        return Ok(None);
    }
    if cursor.starts_with("_Z") {
        // nested encoding, parsed with its own substitution table
        let Some(inner) = cursor.advance_until("E") else {
            return Ok(None);
        };
        let mut inner_cursor = Cursor::new(inner);
        return parse_mangled_name(&mut inner_cursor);
    }
    let Some(ty) = parse_type(cursor)? else {
        return Ok(None);
    };
    let Some(value) = cursor.advance_until("E") else {
        return Ok(None);
    };
    Ok(Some(Node::Literal {
        value: value.to_string(),
        ty: Box::new(ty),
    }))
}

fn parse_encoding(cursor: &mut Cursor) -> cu::Result<Option<Node>> {
    let Some(name) = parse_name(cursor, false)? else {
        return Ok(None);
    };
    if cursor.at_end() {
        return Ok(Some(name));
    }

    // a return type is spelled out iff the function is templated and not a
    // constructor, destructor, or conversion operator
    let wants_ret_ty = match &name {
        Node::QualName(parts) => {
            matches!(parts.last(), Some(Node::TplArgs(_)))
                && !matches!(
                    parts.len().checked_sub(2).and_then(|i| parts.get(i)),
                    Some(Node::Ctor(_)) | Some(Node::Dtor(_)) | Some(Node::OperCast(_))
                )
        }
        _ => false,
    };
    let ret_ty = if wants_ret_ty {
        let Some(ty) = parse_type(cursor)? else {
            return Ok(None);
        };
        Some(Box::new(ty))
    } else {
        None
    };

    let mut arg_tys = Vec::new();
    while !cursor.at_end() {
        let Some(arg_ty) = parse_type(cursor)? else {
            return Ok(None);
        };
        arg_tys.push(arg_ty);
    }

    if arg_tys.is_empty() {
        return Ok(Some(name));
    }
    let func = Node::Func {
        name: Some(Box::new(name)),
        arg_tys,
        ret_ty,
    };
    Ok(Some(expand_template_args(func)))
}

fn parse_special(cursor: &mut Cursor) -> cu::Result<Option<Node>> {
    let Some(caps) = cursor.match_re(&SPECIAL_RE) else {
        return Ok(None);
    };
    if caps.name("rtti").is_some() {
        let Some(ty) = parse_type(cursor)? else {
            return Ok(None);
        };
        let ty = Box::new(ty);
        let node = match caps.name("rtti_kind").map(|m| m.as_str()) {
            Some("V") => Node::Vtable(ty),
            Some("T") => Node::Vtt(ty),
            Some("I") => Node::Typeinfo(ty),
            _ => Node::TypeinfoName(ty),
        };
        Ok(Some(node))
    } else if caps.name("nonvirtual_thunk").is_some() {
        // the offset is consumed by the discriminator but not kept
        let Some(func) = parse_encoding(cursor)? else {
            return Ok(None);
        };
        Ok(Some(Node::NonvirtThunk(Box::new(func))))
    } else if caps.name("virtual_thunk").is_some() {
        let Some(func) = parse_encoding(cursor)? else {
            return Ok(None);
        };
        Ok(Some(Node::VirtThunk(Box::new(func))))
    } else if caps.name("covariant_thunk").is_some() {
        cu::bail!("covariant thunks are not supported");
    } else if caps.name("guard_variable").is_some() {
        let Some(ty) = parse_type(cursor)? else {
            return Ok(None);
        };
        Ok(Some(Node::GuardVariable(Box::new(ty))))
    } else if caps.name("extended_temporary").is_some() {
        cu::bail!("extended temporaries are not supported");
    } else {
        // transaction_clone
        let Some(func) = parse_encoding(cursor)? else {
            return Ok(None);
        };
        Ok(Some(Node::TransactionClone(Box::new(func))))
    }
}

fn parse_mangled_name(cursor: &mut Cursor) -> cu::Result<Option<Node>> {
    if !cursor.accept("_Z") && !cursor.accept("__Z") {
        return Ok(None);
    }
    if let Some(special) = parse_special(cursor)? {
        return Ok(Some(special));
    }
    parse_encoding(cursor)
}

/// Replace in-range `TplParam` references inside a templated function with
/// the argument they point at. Out-of-range references stay literal.
fn expand_template_args(func: Node) -> Node {
    let tpl_args = match &func {
        Node::Func {
            name: Some(name), ..
        } => match name.as_ref() {
            Node::QualName(parts) => match parts.last() {
                Some(Node::TplArgs(args)) => Some(args.clone()),
                _ => None,
            },
            _ => None,
        },
        _ => None,
    };
    match tpl_args {
        Some(args) => substitute_tpl_params(&func, &args),
        None => func,
    }
}

fn substitute_tpl_params(node: &Node, args: &[Node]) -> Node {
    if let Node::TplParam(i) = node {
        if *i < args.len() {
            return args[*i].clone();
        }
    }
    node.map(|child| substitute_tpl_params(child, args))
}

/// Splice variadic packs into their surrounding lists: pack children of a
/// `TplArgs` expand in place, and `expand_arg_pack(rvalue(pack))` argument
/// types expand into the argument list with the pack elements as they are.
/// Other pack expansions stay unexpanded.
fn expand_arg_packs(node: &Node) -> Node {
    match node {
        Node::TplArgs(args) => {
            let mut spliced = Vec::new();
            for arg in args {
                match arg {
                    Node::TplArgPack(inner) | Node::TplArgs(inner) => {
                        spliced.extend(inner.iter().cloned());
                    }
                    other => spliced.push(other.clone()),
                }
            }
            Node::TplArgs(spliced.iter().map(expand_arg_packs).collect())
        }
        Node::Func {
            name,
            arg_tys,
            ret_ty,
        } => {
            let name = name.as_ref().map(|n| Box::new(expand_arg_packs(n)));
            let ret_ty = ret_ty.as_ref().map(|n| Box::new(expand_arg_packs(n)));
            let mut expanded = Vec::new();
            for arg_ty in arg_tys {
                let arg_ty = expand_arg_packs(arg_ty);
                let mut splice = None;
                if let Node::ExpandArgPack(inner) = &arg_ty {
                    if let Node::Rvalue(pack) = inner.as_ref() {
                        match pack.as_ref() {
                            Node::TplArgPack(elems) | Node::TplArgs(elems) => {
                                splice = Some(elems.clone());
                            }
                            _ => {}
                        }
                    }
                }
                match splice {
                    // the pack elements go in unwrapped
                    Some(elems) => expanded.extend(elems),
                    None => expanded.push(arg_ty),
                }
            }
            Node::Func {
                name,
                arg_tys: expanded,
                ret_ty,
            }
        }
        other => other.map(expand_arg_packs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cu::Context;

    fn check(mangled: &str, expected: &str) -> cu::Result<()> {
        let ast = cu::check!(demangle_itanium(mangled)?, "failed to demangle '{mangled}'")?;
        assert_eq!(ast.to_string(), expected, "demangling '{mangled}'");
        Ok(())
    }

    #[test]
    fn test_variable_names() -> cu::Result<()> {
        check("_ZSt4cout", "std::cout")?;
        check("_ZN3foo3barE", "foo::bar")?;
        check("__ZSt4cout", "std::cout")?;
        Ok(())
    }

    #[test]
    fn test_simple_functions() -> cu::Result<()> {
        check("_Z3fooi", "foo(int)")?;
        check("_Z3foov", "foo()")?;
        check("_Z3fooid", "foo(int, double)")?;
        check("_ZN3foo3barEv", "foo::bar()")?;
        Ok(())
    }

    #[test]
    fn test_reference_args() -> cu::Result<()> {
        check(
            "_ZN9wikipedia7article8print_toERSo",
            "wikipedia::article::print_to(std::ostream&)",
        )?;
        check("_Z1fRi", "f(int&)")?;
        check("_Z1fOi", "f(int&&)")?;
        Ok(())
    }

    #[test]
    fn test_method_qualifiers() -> cu::Result<()> {
        check("_ZNK3foo3barEv", "foo::bar() const")?;
        check("_ZNVK3foo3barEv", "foo::bar() const volatile")?;
        Ok(())
    }

    #[test]
    fn test_template_param_substitution() -> cu::Result<()> {
        check("_Z3fooIiEvT_", "void foo<int>(int)")?;
        check("_Z3fooIidEvT_T0_", "void foo<int, double>(int, double)")?;
        Ok(())
    }

    #[test]
    fn test_template_param_out_of_range_stays() -> cu::Result<()> {
        check("_Z3fooIiEvT1_", "void foo<int>({T2})")?;
        Ok(())
    }

    #[test]
    fn test_specials() -> cu::Result<()> {
        check("_ZTV3foo", "vtable for foo")?;
        check("_ZTT3foo", "vtt for foo")?;
        check("_ZTI3foo", "typeinfo for foo")?;
        check("_ZTS3foo", "typeinfo name for foo")?;
        check("_ZGVN3foo3barE", "guard variable for foo::bar")?;
        check("_ZThn8_N3foo3barEv", "non-virtual thunk for foo::bar()")?;
        check("_ZTv0_n12_N3foo3barEv", "virtual thunk for foo::bar()")?;
        check("_ZGTt3foov", "transaction clone for foo()")?;
        Ok(())
    }

    #[test]
    fn test_std_templates_with_substitutions() -> cu::Result<()> {
        check(
            "_ZNSt6vectorIiSaIiEE9push_backERKi",
            "std::vector<int, std::allocator<int>>::push_back(int const&)",
        )?;
        check(
            "_ZNSt6vectorIiSaIiEEC1Ev",
            "std::vector<int, std::allocator<int>>::{ctor}()",
        )?;
        Ok(())
    }

    #[test]
    fn test_ctor_dtor_variants() -> cu::Result<()> {
        check("_ZN3fooC1Ev", "foo::{ctor}()")?;
        check("_ZN3fooC2Ev", "foo::{base ctor}()")?;
        check("_ZN3fooC3Ev", "foo::{allocating ctor}()")?;
        check("_ZN3fooD0Ev", "foo::{deleting dtor}()")?;
        check("_ZN3fooD1Ev", "foo::{dtor}()")?;
        check("_ZN3fooD2Ev", "foo::{base dtor}()")?;
        Ok(())
    }

    #[test]
    fn test_operators() -> cu::Result<()> {
        check("_Znwm", "operator new(unsigned long)")?;
        check("_Zdlv", "operator delete()")?;
        check("_ZN3fooaSERKS_", "foo::operator=(foo const&)")?;
        check("_ZN3fooixEi", "foo::operator[](int)")?;
        Ok(())
    }

    #[test]
    fn test_conversion_operator() -> cu::Result<()> {
        check("_ZNK3foocviEv", "foo::operator int() const")?;
        Ok(())
    }

    #[test]
    fn test_abi_tags() -> cu::Result<()> {
        check("_ZN3fooB5cxx113barEv", "foo[abi:cxx11]::bar()")?;
        Ok(())
    }

    #[test]
    fn test_declarators() -> cu::Result<()> {
        check("_Z1fPi", "f(int*)")?;
        check("_Z1fPKc", "f(char const*)")?;
        check("_Z1fPFviE", "f(void (*)(int))")?;
        check("_Z1fM3fooi", "f(int foo::*)")?;
        check("_Z1fM3fooFvvE", "f(void (foo::*)())")?;
        check("_Z1fA5_i", "f(int[(int)5])")?;
        Ok(())
    }

    #[test]
    fn test_literal_template_args() -> cu::Result<()> {
        check("_Z1fILi5EEvv", "void f<(int)5>()")?;
        check("_Z1fILb1EEvv", "void f<(bool)1>()")?;
        Ok(())
    }

    #[test]
    fn test_nested_encoding_template_arg() -> cu::Result<()> {
        check("_Z1fIL_Z3barEEvv", "void f<bar>()")?;
        Ok(())
    }

    #[test]
    fn test_substitution_matches_hand_expansion() -> cu::Result<()> {
        let compressed = cu::check!(demangle_itanium("_Z1fPiS_")?, "compressed")?;
        let expanded = cu::check!(demangle_itanium("_Z1fPiPi")?, "expanded")?;
        assert_eq!(compressed, expanded);
        assert_eq!(compressed.to_string(), "f(int*, int*)");

        let compressed = cu::check!(demangle_itanium("_Z1fSsS_")?, "compressed")?;
        let expanded = cu::check!(demangle_itanium("_Z1fSsSs")?, "expanded")?;
        assert_eq!(compressed, expanded);
        assert_eq!(compressed.to_string(), "f(std::string, std::string)");
        Ok(())
    }

    #[test]
    fn test_pack_expansion_end_to_end() -> cu::Result<()> {
        check("_Z1fIJifEEvDpOT_", "void f<int, float>(int, float)")?;
        Ok(())
    }

    #[test]
    fn test_by_value_pack_stays_unexpanded() -> cu::Result<()> {
        check("_Z1fIJiEEvDpT_", "void f<int>(int...)")?;
        Ok(())
    }

    #[test]
    fn test_tpl_args_splice_law() {
        let int = Node::builtin("int");
        let float = Node::builtin("float");
        let args = Node::TplArgs(vec![
            int.clone(),
            Node::TplArgPack(vec![int.clone(), float.clone()]),
            float.clone(),
        ]);
        let rewritten = expand_arg_packs(&args);
        assert_eq!(
            rewritten,
            Node::TplArgs(vec![int.clone(), int, float.clone(), float])
        );
    }

    #[test]
    fn test_func_splice_law_unwraps_elements() {
        let int = Node::builtin("int");
        let float = Node::builtin("float");
        let pack = Node::ExpandArgPack(Box::new(Node::Rvalue(Box::new(Node::TplArgPack(vec![
            int.clone(),
            float.clone(),
        ])))));
        let func = Node::Func {
            name: None,
            arg_tys: vec![pack],
            ret_ty: None,
        };
        let rewritten = expand_arg_packs(&func);
        // the pack elements land in the argument list without the rvalue
        // wrapper that surrounded the pack
        assert_eq!(
            rewritten,
            Node::Func {
                name: None,
                arg_tys: vec![int, float],
                ret_ty: None,
            }
        );
    }

    #[test]
    fn test_substitute_params_recurses_into_types() {
        let int = Node::builtin("int");
        let arg = Node::Pointer(Box::new(Node::TplParam(0)));
        let replaced = substitute_tpl_params(&arg, std::slice::from_ref(&int));
        assert_eq!(replaced, Node::Pointer(Box::new(int)));
        // out of range stays literal
        let arg = Node::Pointer(Box::new(Node::TplParam(3)));
        assert_eq!(substitute_tpl_params(&arg, &[]), arg);
    }

    #[test]
    fn test_unsupported_constructs_are_errors() {
        assert!(demangle_itanium("_ZZ4mainE3var").is_err());
        assert!(demangle_itanium("_ZUt_").is_err());
        assert!(demangle_itanium("_ZUlvE_").is_err());
        assert!(demangle_itanium("_Z1fX3barE").is_err());
        assert!(demangle_itanium("_Z1fDtiE").is_err());
        assert!(demangle_itanium("_ZTc0_0_N3foo3barEv").is_err());
        assert!(demangle_itanium("_ZGR3fooE").is_err());
    }

    #[test]
    fn test_malformed_is_none() -> cu::Result<()> {
        assert!(demangle_itanium("hello")?.is_none());
        assert!(demangle_itanium("_Z")?.is_none());
        assert!(demangle_itanium("_Z3fo")?.is_none());
        assert!(demangle_itanium("_ZSt")?.is_none());
        assert!(demangle_itanium("_ZS_")?.is_none());
        assert!(demangle_itanium("_ZN3foo")?.is_none());
        Ok(())
    }

    #[test]
    fn test_render_is_idempotent() -> cu::Result<()> {
        let ast = cu::check!(
            demangle_itanium("_ZNSt6vectorIiSaIiEE9push_backERKi")?,
            "demangle"
        )?;
        let first = ast.to_string();
        assert_eq!(ast.to_string(), first);
        Ok(())
    }
}
