use relaytrace_grammar::{SplitNode, split};

fn t(s: &str) -> SplitNode {
    SplitNode::Token(s.to_string())
}

fn l(nodes: Vec<SplitNode>) -> SplitNode {
    SplitNode::List(nodes)
}

#[test]
fn single_separator_yields_flat_tokens() {
    assert_eq!(split("foo=123,bar", ","), vec![t("foo=123"), t("bar")]);
    assert_eq!(split("foo=123, bar", ","), vec![t("foo=123"), t("bar")]);
}

#[test]
fn two_separators_yield_nested_lists() {
    assert_eq!(split("foo=123; bar", ",;"), vec![l(vec![t("foo=123"), t("bar")])]);
    assert_eq!(
        split("foo=123, bar", ",;"),
        vec![l(vec![t("foo=123")]), l(vec![t("bar")])]
    );
    assert_eq!(
        split("foo=123, bar", ",="),
        vec![l(vec![t("foo"), t("123")]), l(vec![t("bar")])]
    );
}

#[test]
fn equals_only_splits_on_first_level() {
    assert_eq!(split("foo=123, bar", "="), vec![t("foo"), t("123, bar")]);
    assert_eq!(split(" foo = 123, bar ", "="), vec![t("foo"), t("123, bar")]);
}

#[test]
fn three_separators_yield_pairs() {
    assert_eq!(
        split("foo=123, bar; foo=456", ",;="),
        vec![
            l(vec![l(vec![t("foo"), t("123")])]),
            l(vec![l(vec![t("bar")]), l(vec![t("foo"), t("456")])]),
        ]
    );
}

#[test]
fn separators_inside_quotes_are_literal() {
    assert_eq!(
        split("foo=\"a,b;c=d\"", ",;="),
        vec![l(vec![l(vec![t("foo"), t("a,b;c=d")])])]
    );
}

#[test]
fn consecutive_separators_collapse() {
    assert_eq!(split("foo,,,, bar", ","), vec![t("foo"), t("bar")]);
    assert_eq!(split(",foo, bar,", ","), vec![t("foo"), t("bar")]);
    assert_eq!(split(" , foo, bar, ", ","), vec![t("foo"), t("bar")]);
    assert_eq!(split("", ","), Vec::<SplitNode>::new());
    assert_eq!(split(",,,", ","), Vec::<SplitNode>::new());
}

#[test]
fn adjacent_tokens_and_quoted_strings_merge() {
    assert_eq!(split("foo \"bar\"", ","), vec![t("foo bar")]);
    assert_eq!(split("\"foo\" bar", ","), vec![t("foo bar")]);
    assert_eq!(split("\"foo\" \"bar\"", ","), vec![t("foo bar")]);
}

#[test]
fn innermost_level_rejoins_extra_key_value_parts() {
    assert_eq!(
        split(
            "foo_cookie=foo=1&bar=2&baz=3; expires=Tue, 22-Sep-2020 06:27:09 GMT; path=/",
            ";="
        ),
        vec![
            l(vec![t("foo_cookie"), t("foo=1&bar=2&baz=3")]),
            l(vec![t("expires"), t("Tue, 22-Sep-2020 06:27:09 GMT")]),
            l(vec![t("path"), t("/")]),
        ]
    );
    assert_eq!(
        split(
            "foo_cookie=foo==; expires=Tue, 22-Sep-2020 06:27:09 GMT; path=/",
            ";="
        ),
        vec![
            l(vec![t("foo_cookie"), t("foo==")]),
            l(vec![t("expires"), t("Tue, 22-Sep-2020 06:27:09 GMT")]),
            l(vec![t("path"), t("/")]),
        ]
    );
    assert_eq!(
        split(
            "foo_cookie=foo=\"a=b\"; expires=Tue, 22-Sep-2020 06:27:09 GMT; path=/",
            ";="
        ),
        vec![
            l(vec![t("foo_cookie"), t("foo=a=b")]),
            l(vec![t("expires"), t("Tue, 22-Sep-2020 06:27:09 GMT")]),
            l(vec![t("path"), t("/")]),
        ]
    );
}

#[test]
fn outer_levels_never_rejoin() {
    // Three parts at the outermost level stay three parts.
    assert_eq!(split("a=b=c", "="), vec![t("a"), t("b"), t("c")]);
}

#[test]
fn malformed_quotes_tokenize_permissively() {
    assert_eq!(
        split("foo, \"bar\", \"baz", ","),
        vec![t("foo"), t("bar"), t("baz")]
    );
    assert_eq!(split("foo, \"bar, baz", ","), vec![t("foo"), t("bar, baz")]);
    assert_eq!(
        split("foo, \"bar, baz\\", ","),
        vec![t("foo"), t("bar, baz\\")]
    );
    assert_eq!(
        split("foo, \"bar, baz\\\\", ","),
        vec![t("foo"), t("bar, baz\\")]
    );
}
