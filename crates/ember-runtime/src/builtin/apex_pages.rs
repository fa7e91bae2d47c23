use crate::class::{ClassType, Method, CURRENT_PAGE};
use crate::error::CompileError;
use crate::value::Value;

/// `ApexPages.currentPage()` reads the page the host put in the context
pub(super) fn class() -> Result<ClassType, CompileError> {
    ClassType::new("ApexPages").with_static_method(Method::native(
        "currentPage",
        &[],
        Some("PageReference"),
        |_, _, ctx| Ok(ctx.get(CURRENT_PAGE).cloned().unwrap_or(Value::Null)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{Dispatch, ExtensionContext};

    fn current_page(ctx: &ExtensionContext) -> Value {
        match class().unwrap().invoke_static("currentPage", &[], ctx).unwrap() {
            Dispatch::Returned(v) => v,
            other => panic!("expected native result, got {:?}", other),
        }
    }

    #[test]
    fn test_current_page_from_context() {
        let ctx = ExtensionContext::new().with(CURRENT_PAGE, "/apex/AccountList");
        assert_eq!(current_page(&ctx), Value::from("/apex/AccountList"));
    }

    #[test]
    fn test_current_page_absent() {
        assert_eq!(current_page(&ExtensionContext::new()), Value::Null);
    }
}
