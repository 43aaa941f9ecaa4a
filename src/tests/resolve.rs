use crate::markdown::helper::{doc, em, li, link, p, ul};
use crate::model::{Node, ResolveErr};

fn list_doc() -> Node {
    doc((
        ul((li(p("ab")), li(p("cd")))),
        p(("x", link("u", "yz"))),
    ))
}

#[test]
fn test_resolve_in_list() {
    let d = list_doc();
    assert_eq!(d.content_size(), 19);

    let rp = d.resolve(10).unwrap();
    assert_eq!(rp.depth(), 3);
    assert_eq!(rp.index(1), 1);
    assert_eq!(rp.before(2), 7);
    assert_eq!(rp.after(2), 13);
    assert_eq!(rp.to_string(), "bullet_list_0/list_item_1/paragraph_0:1");
    assert_eq!(rp.node(2).r#type().name(), "list_item");

    assert_eq!(d.resolve(20), Err(ResolveErr::RangeError { pos: 20 }));
}

#[test]
fn test_block_range_across_items() {
    let d = list_doc();
    let from = d.resolve(3).unwrap();
    let to = d.resolve(10).unwrap();
    let range = from.block_range(&to, None).unwrap();
    assert_eq!(range.depth, 1);
    assert_eq!(range.start(), 1);
    assert_eq!(range.end(), 13);
    assert_eq!((range.start_index(), range.end_index()), (0, 2));
    assert_eq!(range.parent().r#type().name(), "bullet_list");

    // Only ranges directly inside the document
    let top_only = |n: &Node| n.r#type().name() == "doc";
    let range = from.block_range(&to, Some(&top_only)).unwrap();
    assert_eq!((range.depth, range.start(), range.end()), (0, 0, 14));
}

#[test]
fn test_marks_at_positions() {
    let d = list_doc();
    let names = |pos: usize| -> Vec<String> {
        d.resolve(pos)
            .unwrap()
            .marks()
            .iter()
            .map(|m| m.r#type().name().to_owned())
            .collect()
    };
    assert!(names(16).is_empty());
    assert_eq!(names(17), vec!["link"]);
    // Links are not inclusive, so typing at their end is not linked
    assert!(names(18).is_empty());

    let d = doc(p(em("ab")));
    let rp = d.resolve(3).unwrap();
    assert_eq!(rp.marks().len(), 1);
}

#[test]
fn test_utf16_positions() {
    let d = doc(p("a\u{1F600}b"));
    assert_eq!(d.child(0).content_size(), 4);
    let rp = d.resolve(4).unwrap();
    assert_eq!(rp.parent_offset(), 3);
    assert_eq!(rp.node_before().unwrap().text(), Some("a\u{1F600}"));
    assert_eq!(rp.node_after().unwrap().text(), Some("b"));
}

#[test]
fn test_resolve_distinguishes_versions() {
    let d1 = doc(p("ab"));
    let d2 = doc(p("xyz"));
    assert_eq!(d1.resolve(2).unwrap().parent(), d1.child(0));
    assert_eq!(d2.resolve(2).unwrap().parent(), d2.child(0));
    assert_eq!(d1.resolve(2).unwrap().node_after().unwrap().text(), Some("b"));
    assert_eq!(d2.resolve(2).unwrap().node_after().unwrap().text(), Some("yz"));
}
