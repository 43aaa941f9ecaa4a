use crate::markdown::helper::{blockquote, doc, h1, li, ol, p};
use crate::model::{Fragment, Slice};
use crate::transform::{replace_step, Step, Transform};

fn closed(content: impl Into<Fragment>) -> Slice {
    Slice::new(content.into(), 0, 0)
}

#[test]
fn test_paragraph_splits_textblock() {
    let mut tr = Transform::new(doc(p("abcd")));
    tr.replace(3, 3, closed(p("x"))).unwrap();
    assert_eq!(tr.doc(), &doc((p("ab"), p("x"), p("cd"))));
}

#[test]
fn test_split_keeps_heading_markup() {
    let mut tr = Transform::new(doc(h1("ab")));
    tr.replace(2, 2, closed(p("x"))).unwrap();
    assert_eq!(tr.doc(), &doc((h1("a"), p("x"), h1("b"))));
}

#[test]
fn test_list_item_gets_wrapped() {
    let mut tr = Transform::new(doc(p("ab")));
    tr.replace(2, 2, closed(li(p("x")))).unwrap();
    assert_eq!(tr.doc(), &doc((p("a"), ol(li(p("x"))), p("b"))));
}

#[test]
fn test_open_slice_into_quote() {
    let source = doc((p("xy"), p("zw")));
    let slice = source.slice(2..6, false).unwrap();
    assert_eq!((slice.open_start, slice.open_end), (1, 1));

    let d = doc(blockquote(p("ab")));
    let step = replace_step(&d, 3, 3, &slice).unwrap().unwrap();
    assert_eq!(
        step.apply(&d).unwrap(),
        doc(blockquote((p("ay"), p("zb"))))
    );
}

#[test]
fn test_delete_moves_trailing_inline_content() {
    let mut tr = Transform::new(doc((p("ab"), blockquote(p("cd")))));
    tr.delete(2, 7).unwrap();
    assert_eq!(tr.doc(), &doc(p("ad")));
    assert!(matches!(tr.steps()[0], Step::ReplaceAround(_)));
}

#[test]
fn test_noop_replace() {
    let d = doc(p("ab"));
    assert_eq!(replace_step(&d, 2, 2, &Slice::empty()), Ok(None));
    let mut tr = Transform::new(d);
    tr.delete(2, 2).unwrap();
    assert!(!tr.doc_changed());
}
