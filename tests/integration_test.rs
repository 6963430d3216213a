use std::rc::Rc;

use mython::runtime::{
    self, Class, Closure, Context, Method, Object, ObjectHolder, RuntimeError, SimpleContext,
};
use mython::tokenizer::{self, Lexer, LexerErrorKind, Token};

fn field(holder: &ObjectHolder, name: &str) -> Result<ObjectHolder, RuntimeError> {
    match &*holder.object()? {
        Object::Instance(instance) => Ok(instance.fields().get(name).cloned().unwrap_or_default()),
        _ => Err(RuntimeError::InvalidHolder),
    }
}

fn set_field(holder: &ObjectHolder, name: &str, value: ObjectHolder) -> Result<(), RuntimeError> {
    if let Object::Instance(instance) = &*holder.object()? {
        instance.fields_mut().insert(name.to_string(), value);
    }
    Ok(())
}

/// `class Point` with `__init__(self, x)`, `__eq__`/`__lt__` on `x` and a
/// `__str__` rendering `Point(x)`.
fn point_class() -> Rc<Class> {
    let init = Method::from_fn("__init__", ["x"], |closure, _| {
        set_field(&closure["self"], "x", closure["x"].clone())?;
        Ok(ObjectHolder::none())
    });
    let eq = Method::from_fn("__eq__", ["other"], |closure, context| {
        let mine = field(&closure["self"], "x")?;
        let theirs = field(&closure["other"], "x")?;
        Ok(ObjectHolder::bool(runtime::equal(&mine, &theirs, context)?))
    });
    let lt = Method::from_fn("__lt__", ["other"], |closure, context| {
        let mine = field(&closure["self"], "x")?;
        let theirs = field(&closure["other"], "x")?;
        Ok(ObjectHolder::bool(runtime::less(&mine, &theirs, context)?))
    });
    let str_method = Method::from_fn("__str__", [] as [&str; 0], |closure, context| {
        let x = field(&closure["self"], "x")?;
        let rendered = runtime::to_display_string(&x, context)?;
        Ok(ObjectHolder::string(format!("Point({})", rendered)))
    });
    Rc::new(Class::new("Point", vec![init, eq, lt, str_method], None))
}

fn point(class: &Rc<Class>, x: i32, context: &mut dyn Context) -> ObjectHolder {
    class
        .instantiate(&[ObjectHolder::number(x)], context)
        .expect("Point should instantiate")
}

#[test]
fn test_tokenize_if_block() {
    let source = "if x == 1:\n  print x\n";
    let expected = vec![
        Token::If,
        Token::Id("x".to_string()),
        Token::Eq,
        Token::Number(1),
        Token::Char(':'),
        Token::Newline,
        Token::Indent,
        Token::Print,
        Token::Id("x".to_string()),
        Token::Newline,
        Token::Dedent,
        Token::Eof,
    ];
    assert_eq!(tokenizer::tokens(source).unwrap(), expected);
}

#[test]
fn test_four_space_block_is_two_levels_deep() {
    let source = "if x == 1:\n    print x\n";
    let expected = vec![
        Token::If,
        Token::Id("x".to_string()),
        Token::Eq,
        Token::Number(1),
        Token::Char(':'),
        Token::Newline,
        Token::Indent,
        Token::Indent,
        Token::Print,
        Token::Id("x".to_string()),
        Token::Newline,
        Token::Dedent,
        Token::Dedent,
        Token::Eof,
    ];
    assert_eq!(tokenizer::tokens(source).unwrap(), expected);
}

#[test]
fn test_token_stream_balances_for_any_layout() {
    let sources = [
        "",
        "x",
        "a\n  b\n    c\n",
        "a\n  b\n    c\n  d\ne\n",
        "class A:\n  def f(self):\n    return 1\n\n  def g(self):\n    if x:\n      return 2\n",
        "# only a comment\n\n",
        "x = 'a # not a comment'\n  y\n",
    ];
    for source in sources {
        let tokens = tokenizer::tokens(source).unwrap();
        let eofs = tokens.iter().filter(|t| **t == Token::Eof).count();
        let indents = tokens.iter().filter(|t| **t == Token::Indent).count();
        let dedents = tokens.iter().filter(|t| **t == Token::Dedent).count();
        assert_eq!(eofs, 1, "{source:?}");
        assert_eq!(tokens.last(), Some(&Token::Eof), "{source:?}");
        assert_eq!(indents, dedents, "{source:?}");
        assert!(
            tokens.windows(2).all(|w| !(w[0] == Token::Newline && w[1] == Token::Newline)),
            "{source:?}"
        );
    }
}

#[test]
fn test_odd_indentation_always_rejected() {
    for width in [1, 3, 5, 7] {
        let source = format!("if x:\n{}y\n", " ".repeat(width));
        let err = tokenizer::tokens(&source).unwrap_err();
        assert!(matches!(err.kind, LexerErrorKind::BadIndentation(w) if w == width));
    }
}

#[test]
fn test_lexer_reads_from_a_buffered_reader() {
    let input = std::io::Cursor::new("print 'hi'\n");
    let mut lexer = Lexer::new(input).unwrap();
    assert_eq!(lexer.current_token(), &Token::Print);
    assert_eq!(lexer.next_token().unwrap(), Token::String("hi".to_string()));
    assert_eq!(lexer.next_token().unwrap(), Token::Newline);
    assert_eq!(lexer.next_token().unwrap(), Token::Eof);
}

#[test]
fn test_instances_compare_through_eq() {
    let class = point_class();
    let mut context = SimpleContext::new(Vec::new());
    let a = point(&class, 3, &mut context);
    let b = point(&class, 3, &mut context);
    let c = point(&class, 4, &mut context);

    assert!(runtime::equal(&a, &b, &mut context).unwrap());
    assert!(!runtime::not_equal(&a, &b, &mut context).unwrap());
    assert!(!runtime::equal(&a, &c, &mut context).unwrap());
    assert!(runtime::not_equal(&a, &c, &mut context).unwrap());
}

#[test]
fn test_instances_order_through_lt() {
    let class = point_class();
    let mut context = SimpleContext::new(Vec::new());
    let small = point(&class, 1, &mut context);
    let big = point(&class, 2, &mut context);

    assert!(runtime::less(&small, &big, &mut context).unwrap());
    assert!(runtime::less_or_equal(&small, &big, &mut context).unwrap());
    assert!(runtime::greater(&big, &small, &mut context).unwrap());
    assert!(runtime::greater_or_equal(&big, &small, &mut context).unwrap());
    let also_small = point(&class, 1, &mut context);
    assert!(runtime::greater_or_equal(&small, &also_small, &mut context).unwrap());
    assert!(!runtime::greater(&small, &big, &mut context).unwrap());
}

#[test]
fn test_print_instance_through_str() {
    let class = point_class();
    let mut context = SimpleContext::new(Vec::new());
    let p = point(&class, 7, &mut context);
    runtime::print(&p, &mut context).unwrap();
    assert_eq!(String::from_utf8(context.into_inner()).unwrap(), "Point(7)");
}

#[test]
fn test_inherited_methods_and_overrides() {
    let base = point_class();
    let describe = Method::from_fn("describe", [] as [&str; 0], |_, _| {
        Ok(ObjectHolder::string("labelled"))
    });
    let str_method = Method::from_fn("__str__", [] as [&str; 0], |closure: &mut Closure, _| {
        let x = field(&closure["self"], "x")?;
        Ok(ObjectHolder::string(format!(
            "Labelled({})",
            x.as_number().unwrap_or_default()
        )))
    });
    let labelled = Rc::new(Class::new("Labelled", vec![describe, str_method], Some(base)));
    let mut context = SimpleContext::new(Vec::new());

    // __init__ and __eq__ come from Point, __str__ is overridden.
    let a = labelled
        .instantiate(&[ObjectHolder::number(5)], &mut context)
        .unwrap();
    let b = labelled
        .instantiate(&[ObjectHolder::number(5)], &mut context)
        .unwrap();
    assert!(runtime::equal(&a, &b, &mut context).unwrap());
    assert_eq!(
        runtime::to_display_string(&a, &mut context).unwrap(),
        "Labelled(5)"
    );

    let object = a.object().unwrap();
    let Object::Instance(instance) = &*object else {
        panic!("expected an instance");
    };
    assert!(instance.has_method("describe", 0));
    assert!(instance.has_method("__init__", 1));
    assert!(!instance.has_method("__init__", 2));
    assert!(matches!(
        instance.call("missing", &[], &mut context),
        Err(RuntimeError::NoSuchMethod { .. })
    ));
}

#[test]
fn test_mixed_comparisons_raise() {
    let mut context = SimpleContext::new(Vec::new());
    let number = ObjectHolder::number(1);
    let string = ObjectHolder::string("1");
    assert!(runtime::equal(&number, &string, &mut context).is_err());
    assert!(runtime::less(&string, &number, &mut context).is_err());
    assert!(runtime::equal(&ObjectHolder::none(), &ObjectHolder::none(), &mut context).unwrap());
}
