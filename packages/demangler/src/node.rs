use std::collections::BTreeSet;

use cu::pre::*;

/// CV qualifier on a type or a member function.
///
/// The enum order is the rendering order: `const volatile restrict`. The
/// mangling grammar does not fix one, so the renderer commits to this one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Qualifier {
    #[display("const")]
    Const,
    #[display("volatile")]
    Volatile,
    #[display("restrict")]
    Restrict,
}

/// Constructor flavor (`C1`/`C2`/`C3` in the Itanium encoding)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CtorKind {
    Complete,
    Base,
    Allocating,
}

/// Destructor flavor (`D0`/`D1`/`D2` in the Itanium encoding)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DtorKind {
    Deleting,
    Complete,
    Base,
}

/// One node of a demangled declaration tree.
///
/// Nodes are immutable once built; rewrites go through [`Node::map`] and
/// produce new trees. Structural equality (the derived `PartialEq`) is the
/// equality the substitution table dedupes by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Node {
    /// Unqualified source name
    Name(String),
    /// Builtin type, stored by its C++ spelling
    Builtin(String),
    Ctor(CtorKind),
    Dtor(DtorKind),
    /// Operator, stored as the symbol without the `operator` keyword
    Oper(String),
    /// Conversion operator to the payload type
    OperCast(Box<Node>),
    /// Reference into the enclosing template argument list, by position
    TplParam(usize),
    /// Unresolved back-reference into a substitution table, by position
    Subst(usize),
    /// `::`-separated name components; only the last may be `TplArgs`,
    /// `Ctor`, `Dtor`, or `OperCast`
    QualName(Vec<Node>),
    /// Template argument list
    TplArgs(Vec<Node>),
    /// Variadic pack of type arguments, spliced by the rewriter
    TplArgPack(Vec<Node>),
    Pointer(Box<Node>),
    Lvalue(Box<Node>),
    Rvalue(Box<Node>),
    /// Pack expansion (`T...`) around the payload
    ExpandArgPack(Box<Node>),
    /// Qualified type; the set is non-empty
    CvQual(BTreeSet<Qualifier>, Box<Node>),
    /// Name carrying a non-empty set of ABI tags
    Abi(BTreeSet<String>, Box<Node>),
    /// Typed literal; the value keeps the raw encoded bytes
    Literal { value: String, ty: Box<Node> },
    /// Function type or declaration. `ret_ty` is present only for templated
    /// functions, whose encoding spells the return type out.
    Func {
        name: Option<Box<Node>>,
        arg_tys: Vec<Node>,
        ret_ty: Option<Box<Node>>,
    },
    Array { dimension: Box<Node>, ty: Box<Node> },
    /// Pointer to a data member
    DataMember { cls_ty: Box<Node>, member_ty: Box<Node> },
    /// Pointer to a member function
    MethodMember { cls_ty: Box<Node>, member_ty: Box<Node> },
    Vtable(Box<Node>),
    Vtt(Box<Node>),
    Typeinfo(Box<Node>),
    TypeinfoName(Box<Node>),
    NonvirtThunk(Box<Node>),
    VirtThunk(Box<Node>),
    GuardVariable(Box<Node>),
    TransactionClone(Box<Node>),
}

impl Node {
    pub fn name(value: &str) -> Self {
        Self::Name(value.to_string())
    }

    pub fn builtin(value: &str) -> Self {
        Self::Builtin(value.to_string())
    }

    /// Apply `f` to every immediate child and rebuild this node from the
    /// results. Leaves clone themselves. This is the only traversal the
    /// rewrite passes need.
    pub fn map(&self, mut f: impl FnMut(&Node) -> Node) -> Node {
        match self {
            Node::Name(_)
            | Node::Builtin(_)
            | Node::Ctor(_)
            | Node::Dtor(_)
            | Node::Oper(_)
            | Node::TplParam(_)
            | Node::Subst(_) => self.clone(),
            Node::OperCast(v) => Node::OperCast(Box::new(f(v))),
            Node::Pointer(v) => Node::Pointer(Box::new(f(v))),
            Node::Lvalue(v) => Node::Lvalue(Box::new(f(v))),
            Node::Rvalue(v) => Node::Rvalue(Box::new(f(v))),
            Node::ExpandArgPack(v) => Node::ExpandArgPack(Box::new(f(v))),
            Node::Vtable(v) => Node::Vtable(Box::new(f(v))),
            Node::Vtt(v) => Node::Vtt(Box::new(f(v))),
            Node::Typeinfo(v) => Node::Typeinfo(Box::new(f(v))),
            Node::TypeinfoName(v) => Node::TypeinfoName(Box::new(f(v))),
            Node::NonvirtThunk(v) => Node::NonvirtThunk(Box::new(f(v))),
            Node::VirtThunk(v) => Node::VirtThunk(Box::new(f(v))),
            Node::GuardVariable(v) => Node::GuardVariable(Box::new(f(v))),
            Node::TransactionClone(v) => Node::TransactionClone(Box::new(f(v))),
            Node::QualName(v) => Node::QualName(v.iter().map(|n| f(n)).collect()),
            Node::TplArgs(v) => Node::TplArgs(v.iter().map(|n| f(n)).collect()),
            Node::TplArgPack(v) => Node::TplArgPack(v.iter().map(|n| f(n)).collect()),
            Node::CvQual(quals, v) => Node::CvQual(quals.clone(), Box::new(f(v))),
            Node::Abi(tags, v) => Node::Abi(tags.clone(), Box::new(f(v))),
            Node::Literal { value, ty } => Node::Literal {
                value: value.clone(),
                ty: Box::new(f(ty)),
            },
            Node::Func {
                name,
                arg_tys,
                ret_ty,
            } => Node::Func {
                name: name.as_ref().map(|n| Box::new(f(n))),
                arg_tys: arg_tys.iter().map(|n| f(n)).collect(),
                ret_ty: ret_ty.as_ref().map(|n| Box::new(f(n))),
            },
            Node::Array { dimension, ty } => Node::Array {
                dimension: Box::new(f(dimension)),
                ty: Box::new(f(ty)),
            },
            Node::DataMember { cls_ty, member_ty } => Node::DataMember {
                cls_ty: Box::new(f(cls_ty)),
                member_ty: Box::new(f(member_ty)),
            },
            Node::MethodMember { cls_ty, member_ty } => Node::MethodMember {
                cls_ty: Box::new(f(cls_ty)),
                member_ty: Box::new(f(member_ty)),
            },
        }
    }

    /// Left half of the declarator split. For nodes that need no split this
    /// is the whole rendering and [`Node::right`] is empty; pointers,
    /// arrays, function types, and member-function pointers put the part
    /// before the declared name here.
    pub fn left(&self) -> String {
        match self {
            Node::Pointer(v) => format!("{}*", v.left()),
            Node::Lvalue(v) => format!("{}&", v.left()),
            Node::Rvalue(v) => format!("{}&&", v.left()),
            Node::Func { name, ret_ty, .. } => {
                let mut out = String::new();
                if let Some(ret) = ret_ty {
                    out.push_str(&ret.to_string());
                    out.push(' ');
                }
                out.push('(');
                if let Some(name) = name {
                    out.push_str(&name.to_string());
                }
                out
            }
            Node::Array { ty, .. } => format!("{ty}("),
            Node::MethodMember { cls_ty, member_ty } => {
                format!("{}{}::*", member_ty.left(), cls_ty)
            }
            _ => self.to_string(),
        }
    }

    /// Right half of the declarator split, see [`Node::left`]
    pub fn right(&self) -> String {
        match self {
            Node::Pointer(v) | Node::Lvalue(v) | Node::Rvalue(v) => v.right(),
            Node::Func { arg_tys, .. } => format!("){}", fmt_arg_list(arg_tys)),
            Node::Array { dimension, .. } => format!(")[{dimension}]"),
            Node::MethodMember { member_ty, .. } => member_ty.right(),
            _ => String::new(),
        }
    }
}

/// Parenthesized argument list; a lone `void` renders as `()`
fn fmt_arg_list(arg_tys: &[Node]) -> String {
    if arg_tys.len() == 1 && matches!(&arg_tys[0], Node::Builtin(b) if b == "void") {
        return "()".to_string();
    }
    let args = arg_tys
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("({args})")
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Name(s) | Node::Builtin(s) => f.write_str(s),
            Node::Ctor(kind) => f.write_str(match kind {
                CtorKind::Complete => "{ctor}",
                CtorKind::Base => "{base ctor}",
                CtorKind::Allocating => "{allocating ctor}",
            }),
            Node::Dtor(kind) => f.write_str(match kind {
                DtorKind::Deleting => "{deleting dtor}",
                DtorKind::Complete => "{dtor}",
                DtorKind::Base => "{base dtor}",
            }),
            Node::Oper(sym) => {
                // alphabetic operators need the separating space
                if sym.starts_with("new") || sym.starts_with("delete") {
                    write!(f, "operator {sym}")
                } else {
                    write!(f, "operator{sym}")
                }
            }
            Node::OperCast(ty) => write!(f, "operator {ty}"),
            Node::TplParam(i) => write!(f, "{{T{i}}}"),
            Node::Subst(i) => write!(f, "{{S{i}}}"),
            Node::QualName(parts) => {
                let mut first = true;
                for part in parts {
                    if !first && !matches!(part, Node::TplArgs(_)) {
                        f.write_str("::")?;
                    }
                    first = false;
                    write!(f, "{part}")?;
                }
                Ok(())
            }
            Node::TplArgs(args) => {
                f.write_str("<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(">")
            }
            Node::TplArgPack(args) => {
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                Ok(())
            }
            Node::Pointer(v) => write!(f, "{}*{}", v.left(), v.right()),
            Node::Lvalue(v) => write!(f, "{}&{}", v.left(), v.right()),
            Node::Rvalue(v) => write!(f, "{}&&{}", v.left(), v.right()),
            Node::ExpandArgPack(v) => write!(f, "{v}..."),
            Node::CvQual(quals, v) => {
                write!(f, "{v}")?;
                for q in quals {
                    write!(f, " {q}")?;
                }
                Ok(())
            }
            Node::Abi(tags, v) => {
                write!(f, "{v}")?;
                for tag in tags {
                    write!(f, "[abi:{tag}]")?;
                }
                Ok(())
            }
            Node::Literal { value, ty } => write!(f, "({ty}){value}"),
            Node::Func {
                name,
                arg_tys,
                ret_ty,
            } => {
                if let Some(ret) = ret_ty {
                    write!(f, "{ret} ")?;
                }
                // method qualifiers wrap the name node; they print after
                // the parameter list
                let mut ref_suffix = "";
                let mut inner = name.as_deref();
                match inner {
                    Some(Node::Lvalue(v)) => {
                        ref_suffix = " &";
                        inner = Some(v);
                    }
                    Some(Node::Rvalue(v)) => {
                        ref_suffix = " &&";
                        inner = Some(v);
                    }
                    _ => {}
                }
                let mut cv_quals = None;
                if let Some(Node::CvQual(quals, v)) = inner {
                    cv_quals = Some(quals);
                    inner = Some(v);
                }
                if let Some(name) = inner {
                    write!(f, "{name}")?;
                }
                f.write_str(&fmt_arg_list(arg_tys))?;
                if let Some(quals) = cv_quals {
                    for q in quals {
                        write!(f, " {q}")?;
                    }
                }
                f.write_str(ref_suffix)
            }
            Node::Array { dimension, ty } => write!(f, "{ty}[{dimension}]"),
            Node::DataMember { cls_ty, member_ty } => {
                write!(f, "{member_ty} {cls_ty}::*")
            }
            Node::MethodMember { cls_ty, member_ty } => {
                write!(f, "{}{}::*{}", member_ty.left(), cls_ty, member_ty.right())
            }
            Node::Vtable(v) => write!(f, "vtable for {v}"),
            Node::Vtt(v) => write!(f, "vtt for {v}"),
            Node::Typeinfo(v) => write!(f, "typeinfo for {v}"),
            Node::TypeinfoName(v) => write!(f, "typeinfo name for {v}"),
            Node::NonvirtThunk(v) => write!(f, "non-virtual thunk for {v}"),
            Node::VirtThunk(v) => write!(f, "virtual thunk for {v}"),
            Node::GuardVariable(v) => write!(f, "guard variable for {v}"),
            Node::TransactionClone(v) => write!(f, "transaction clone for {v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> Node {
        Node::builtin("int")
    }

    fn void() -> Node {
        Node::builtin("void")
    }

    #[test]
    fn test_qual_name_display() {
        let node = Node::QualName(vec![
            Node::name("std"),
            Node::name("vector"),
            Node::TplArgs(vec![int()]),
            Node::name("push_back"),
        ]);
        assert_eq!(node.to_string(), "std::vector<int>::push_back");
    }

    #[test]
    fn test_pointer_to_function_display() {
        let func = Node::Func {
            name: None,
            arg_tys: vec![int()],
            ret_ty: Some(Box::new(void())),
        };
        let node = Node::Pointer(Box::new(func));
        assert_eq!(node.to_string(), "void (*)(int)");
    }

    #[test]
    fn test_pointer_to_array_display() {
        let array = Node::Array {
            dimension: Box::new(Node::Literal {
                value: "5".to_string(),
                ty: Box::new(int()),
            }),
            ty: Box::new(int()),
        };
        let node = Node::Pointer(Box::new(array));
        assert_eq!(node.to_string(), "int(*)[(int)5]");
    }

    #[test]
    fn test_method_member_display() {
        let func = Node::Func {
            name: None,
            arg_tys: vec![void()],
            ret_ty: Some(Box::new(void())),
        };
        let node = Node::MethodMember {
            cls_ty: Box::new(Node::name("foo")),
            member_ty: Box::new(func),
        };
        assert_eq!(node.to_string(), "void (foo::*)()");
    }

    #[test]
    fn test_cv_qual_order_is_stable() {
        let quals = [Qualifier::Restrict, Qualifier::Const, Qualifier::Volatile]
            .into_iter()
            .collect::<BTreeSet<_>>();
        let node = Node::CvQual(quals, Box::new(int()));
        assert_eq!(node.to_string(), "int const volatile restrict");
    }

    #[test]
    fn test_method_qualifiers_print_after_params() {
        let name = Node::Rvalue(Box::new(Node::CvQual(
            [Qualifier::Const].into_iter().collect(),
            Box::new(Node::QualName(vec![Node::name("foo"), Node::name("bar")])),
        )));
        let func = Node::Func {
            name: Some(Box::new(name)),
            arg_tys: vec![void()],
            ret_ty: None,
        };
        assert_eq!(func.to_string(), "foo::bar() const &&");
    }

    #[test]
    fn test_map_replaces_children() {
        let node = Node::QualName(vec![Node::name("a"), Node::name("b")]);
        let mapped = node.map(|child| match child {
            Node::Name(s) if s == "a" => Node::name("z"),
            other => other.clone(),
        });
        assert_eq!(
            mapped,
            Node::QualName(vec![Node::name("z"), Node::name("b")])
        );
        // the original is untouched
        assert_eq!(node.to_string(), "a::b");
    }

    #[test]
    fn test_map_reaches_thunk_payload() {
        let node = Node::NonvirtThunk(Box::new(Node::name("a")));
        let mapped = node.map(|_| Node::name("b"));
        assert_eq!(mapped, Node::NonvirtThunk(Box::new(Node::name("b"))));
    }

    #[test]
    fn test_display_is_pure() {
        let node = Node::Func {
            name: Some(Box::new(Node::name("foo"))),
            arg_tys: vec![int(), int()],
            ret_ty: None,
        };
        let first = node.to_string();
        assert_eq!(first, "foo(int, int)");
        assert_eq!(node.to_string(), first);
    }
}
