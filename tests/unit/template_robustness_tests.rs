//! Template parsing edge cases and error conditions: malformed input must
//! produce errors (or degrade to literal text), never panic.

use sqlweave::template_parser::{parse_template, TemplateError};

#[test]
fn malformed_templates_do_not_panic() {
    let malformed = vec![
        "",
        "<",
        "<if",
        "<if>",
        "<if test=>x</if>",
        "<if test=\"a\">",
        "<if test=\"a\">x</foreach>",
        "</if>",
        "<choose></otherwise>",
        "<foreach>x</foreach>",
        "<trim prefix=>x</trim>",
        "<bind name=\"x\"/>",
        "<include/>",
        "#{unclosed",
        "${unclosed",
        "a < b <if test=\"x\">y",
    ];
    for template in malformed {
        // Some of these parse (partially or as literal text); the important
        // thing is that none of them panic.
        let _ = parse_template(template);
    }
}

#[test]
fn sql_comparison_text_round_trips() {
    let cases = vec![
        "a < b",
        "a <= b",
        "a <> b",
        "price < 100 AND discount > 0.5",
        "x << 2",
    ];
    for sql in cases {
        match parse_template(sql) {
            Ok(node) => assert!(!node.is_dynamic(), "{} must stay literal", sql),
            Err(err) => panic!("'{}' failed to parse: {}", sql, err),
        }
    }
}

#[test]
fn unknown_elements_stay_literal_text() {
    // `<b>` is not a registered directive; the parser must treat it as SQL.
    let node = parse_template("SELECT <b>bold</b> FROM t");
    assert!(node.is_ok());
}

#[test]
fn missing_test_attribute_is_reported_precisely() {
    match parse_template("<if>x</if>") {
        Err(TemplateError::MissingAttribute { element, attribute }) => {
            assert_eq!(element, "if");
            assert_eq!(attribute, "test");
        }
        other => panic!("expected missing attribute, got {:?}", other),
    }
}

#[test]
fn stray_closing_tag_is_reported() {
    assert!(matches!(
        parse_template("x</if>"),
        Err(TemplateError::MismatchedCloseTag { .. })
    ));
}

#[test]
fn deeply_nested_elements_parse() {
    let template = r#"
        <where>
            <if test="a != null">
                <choose>
                    <when test="b != null">
                        <foreach collection="xs" item="x" separator=",">
                            <if test="x != null">#{x}</if>
                        </foreach>
                    </when>
                    <otherwise>b IS NULL</otherwise>
                </choose>
            </if>
        </where>"#;
    assert!(parse_template(template).is_ok());
}
