//! Reader and writer for the `.tnlib` module-interface format:
//!
//! ```text
//! tnlib <integer-version>
//! module <identifier>
//! fn <identifier> ( [ <identifier> { , <identifier> } ] ) ;
//! ...
//! end
//! ```
//!
//! Version `1` is the only version defined. Both sides use the same
//! tokenizer as source, in [`Mode::Interface`].

use crate::binder::ImportedFunction;
use crate::ir::PublicFunction;
use crate::token::{Keyword, Mode, Tag, TokenCursor, Tokenizer};

pub const VERSION: i32 = 1;

pub struct Interface {
    pub module: String,
    pub functions: Vec<ImportedFunction>,
}

/// Parse a `.tnlib` file's contents.
pub fn parse(text: &str) -> Result<Interface, String> {
    let tokens = Tokenizer::new(text, Mode::Interface).tokenize()?;
    let mut cur = TokenCursor::new(tokens);

    cur.expect(Tag::Keyword(Keyword::Tnlib))?;
    let version = cur.expect_num()?;
    if version != VERSION {
        return Err(format!("unsupported tnlib version {}", version));
    }

    cur.expect(Tag::Keyword(Keyword::Module))?;
    let module_token = cur.expect_ident()?;
    let module = cur.ident_text(module_token).to_string();

    let mut functions = Vec::new();
    while !cur.peek_kind(Tag::Keyword(Keyword::End), 0) {
        cur.expect(Tag::Keyword(Keyword::Fn))?;
        let name_token = cur.expect_ident()?;
        let name = cur.ident_text(name_token).to_string();
        cur.expect(Tag::LParen)?;
        let mut params = Vec::new();
        if !cur.peek_kind(Tag::RParen, 0) {
            let p = cur.expect_ident()?;
            params.push(cur.ident_text(p).to_string());
            while cur.consume(Tag::Comma) {
                let p = cur.expect_ident()?;
                params.push(cur.ident_text(p).to_string());
            }
        }
        cur.expect(Tag::RParen)?;
        cur.expect(Tag::Semi)?;
        functions.push(ImportedFunction { name, params });
    }
    cur.expect(Tag::Keyword(Keyword::End))?;

    Ok(Interface { module, functions })
}

/// Render a compiled module's public functions as `.tnlib` text.
pub fn render(module_name: &str, public_functions: &[PublicFunction]) -> String {
    let mut out = String::new();
    out.push_str(&format!("tnlib {}\n", VERSION));
    out.push_str(&format!("module {}\n", module_name));
    for func in public_functions {
        out.push_str(&format!("fn {}({});\n", func.name, func.params.join(", ")));
    }
    out.push_str("end\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_public_functions_in_definition_order() {
        let funcs = vec![
            PublicFunction {
                name: "f".to_string(),
                params: vec!["a".to_string(), "b".to_string()],
            },
            PublicFunction {
                name: "g".to_string(),
                params: vec![],
            },
        ];
        let text = render("mymod", &funcs);
        assert_eq!(text, "tnlib 1\nmodule mymod\nfn f(a, b);\nfn g();\nend\n");

        let parsed = parse(&text).unwrap();
        assert_eq!(parsed.module, "mymod");
        assert_eq!(parsed.functions.len(), 2);
        assert_eq!(parsed.functions[0].name, "f");
        assert_eq!(parsed.functions[0].params, vec!["a", "b"]);
        assert_eq!(parsed.functions[1].name, "g");
        assert!(parsed.functions[1].params.is_empty());
    }

    #[test]
    fn single_function_renders_exactly_one_line() {
        let funcs = vec![PublicFunction {
            name: "f".to_string(),
            params: vec!["a".to_string(), "b".to_string()],
        }];
        let text = render("mymod", &funcs);
        let fn_line = text.lines().find(|l| l.starts_with("fn")).unwrap();
        assert_eq!(fn_line, "fn f(a, b);");
    }

    #[test]
    fn rejects_unknown_version() {
        let text = "tnlib 2\nmodule m\nend\n";
        assert!(parse(text).is_err());
    }

    #[test]
    fn tolerates_trailing_whitespace() {
        let text = "tnlib 1  \nmodule m   \nfn f();  \nend  \n";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.functions.len(), 1);
    }
}
