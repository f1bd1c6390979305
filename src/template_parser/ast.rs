//! Template AST types.

/// A node of a parsed statement template.
///
/// Every node is side-effect-free except through the dynamic context it is
/// handed during composition; evaluation order is exactly document order.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    /// Literal SQL text with no `${...}` placeholders.
    StaticText(String),
    /// SQL text containing `${...}` placeholders, substituted at
    /// composition time (distinct from `#{...}`, which becomes a bound
    /// parameter at compile time).
    DynamicText(String),
    /// `<if test="...">`
    Conditional {
        test: TestExpr,
        child: Box<TemplateNode>,
    },
    /// `<choose>` with ordered `<when>` branches and at most one
    /// `<otherwise>`.
    Choice {
        branches: Vec<ChoiceBranch>,
        default_branch: Option<Box<TemplateNode>>,
    },
    /// `<foreach>`
    Loop(LoopNode),
    /// `<trim>`, and the `<where>`/`<set>` specializations.
    Trim(TrimNode),
    /// `<bind name="..." value="..."/>`
    Bind { name: String, value: TestExpr },
    /// `<include refid="..."/>`, replaced by the referenced fragment before
    /// the template is usable.
    IncludeRef { refid: String },
    /// Ordered sequence of child nodes.
    Composite(Vec<TemplateNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceBranch {
    pub test: TestExpr,
    pub child: TemplateNode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopNode {
    pub collection: String,
    pub item: Option<String>,
    pub index: Option<String>,
    pub open: Option<String>,
    pub close: Option<String>,
    pub separator: Option<String>,
    pub child: Box<TemplateNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrimNode {
    pub prefix: Option<String>,
    pub prefix_overrides: Vec<String>,
    pub suffix: Option<String>,
    pub suffix_overrides: Vec<String>,
    pub child: Box<TemplateNode>,
}

impl TemplateNode {
    /// Whether composing this node can depend on runtime parameter values.
    ///
    /// Templates where no node is dynamic take the raw compilation path:
    /// their SQL text is computed once and cached by template identity.
    pub fn is_dynamic(&self) -> bool {
        match self {
            TemplateNode::StaticText(_) => false,
            TemplateNode::DynamicText(_)
            | TemplateNode::Conditional { .. }
            | TemplateNode::Choice { .. }
            | TemplateNode::Loop(_)
            | TemplateNode::Bind { .. }
            | TemplateNode::IncludeRef { .. } => true,
            TemplateNode::Trim(trim) => trim.child.is_dynamic(),
            TemplateNode::Composite(children) => children.iter().any(TemplateNode::is_dynamic),
        }
    }

    /// Whether any `<include>` reference remains unresolved in this tree.
    pub fn has_unresolved_includes(&self) -> bool {
        match self {
            TemplateNode::IncludeRef { .. } => true,
            TemplateNode::StaticText(_) | TemplateNode::DynamicText(_) | TemplateNode::Bind { .. } => {
                false
            }
            TemplateNode::Conditional { child, .. } => child.has_unresolved_includes(),
            TemplateNode::Choice {
                branches,
                default_branch,
            } => {
                branches.iter().any(|b| b.child.has_unresolved_includes())
                    || default_branch
                        .as_ref()
                        .is_some_and(|d| d.has_unresolved_includes())
            }
            TemplateNode::Loop(node) => node.child.has_unresolved_includes(),
            TemplateNode::Trim(node) => node.child.has_unresolved_includes(),
            TemplateNode::Composite(children) => {
                children.iter().any(TemplateNode::has_unresolved_includes)
            }
        }
    }
}

/// Boolean/value expression used by `test="..."` and `<bind value="...">`.
#[derive(Debug, Clone, PartialEq)]
pub enum TestExpr {
    Literal(TestLiteral),
    /// A property path resolved against context bindings, then the
    /// parameter object.
    Property(String),
    Comparison {
        op: CompareOp,
        lhs: Box<TestExpr>,
        rhs: Box<TestExpr>,
    },
    And(Box<TestExpr>, Box<TestExpr>),
    Or(Box<TestExpr>, Box<TestExpr>),
    Not(Box<TestExpr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TestLiteral {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}
