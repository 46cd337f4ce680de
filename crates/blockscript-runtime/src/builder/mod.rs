//! Builder: source text to executable assembly
//!
//! The builder owns the base arena that intrinsic registration writes into.
//! `build` compiles against a copy of it and only commits on success:
//!
//! ```text
//! lex -> parse -> register structs -> declare functions
//!     -> type check -> canonize -> Assembly (+ frozen arena)
//! ```

mod arena;

pub use arena::{ArgDec, DeclareError, FunDesc, FunId, ModuleArena, StackFrameInfo, StmtFunDec};

use crate::assembly::{Assembly, Block, FunMapEntry};
use crate::ast::{FunctionDecl, Item, Program, StructDecl};
use crate::canonizer::canonize;
use crate::diagnostic::{error_codes, Diagnostic};
use crate::lexer::Lexer;
use crate::log::LogTag;
use crate::parser::Parser;
use crate::string_pool::StringPool;
use crate::type_table::{TypeError, TypeId};
use crate::typechecker::{StringLiterals, TypeChecker};
use blockscript_config::CompilerConfig;
use std::sync::Arc;

/// Compiles BlockScript source and hosts intrinsic registration
#[derive(Debug, Clone)]
pub struct BlockScriptBuilder {
    base: ModuleArena,
    committed: Option<Arc<ModuleArena>>,
}

impl Default for BlockScriptBuilder {
    fn default() -> Self {
        Self::new(&CompilerConfig::default())
    }
}

impl BlockScriptBuilder {
    pub fn new(config: &CompilerConfig) -> Self {
        Self {
            base: ModuleArena::new(config.string_pool_slots_per_page),
            committed: None,
        }
    }

    /// Arena that intrinsic registration writes into
    pub fn arena(&self) -> &ModuleArena {
        &self.base
    }

    pub(crate) fn arena_mut(&mut self) -> &mut ModuleArena {
        &mut self.base
    }

    /// Arena of the last successful build, if any
    pub fn committed(&self) -> Option<&Arc<ModuleArena>> {
        self.committed.as_ref()
    }

    /// Look up a type, preferring the arena of the last successful build
    ///
    /// Script-declared structs are only visible after the build that
    /// declared them.
    pub fn type_by_name(&self, name: &str) -> Option<TypeId> {
        match &self.committed {
            Some(arena) => arena.types().type_by_name(name),
            None => self.base.types().type_by_name(name),
        }
    }

    /// Register a host struct type that intrinsics and scripts can use
    pub fn register_type(&mut self, name: &str, fields: &[(&str, TypeId)]) -> Result<TypeId, TypeError> {
        self.base.types.register_type(name, fields)
    }

    /// Compile `source` into an assembly
    ///
    /// Every declaration of the base arena (intrinsics included) gets a
    /// block, so bind points resolved against the result cover both native
    /// and scripted functions. Diagnostics come back located against `source`.
    pub fn build(&mut self, source: &str) -> Result<Assembly, Vec<Diagnostic>> {
        let locate = |diagnostics: Vec<Diagnostic>| -> Vec<Diagnostic> {
            diagnostics.into_iter().map(|d| d.locate(source)).collect()
        };

        let (tokens, lex_diagnostics) = Lexer::new(source).tokenize();
        if lex_diagnostics.iter().any(Diagnostic::is_error) {
            return Err(locate(lex_diagnostics));
        }

        let (program, parse_diagnostics) = Parser::new(tokens).parse();
        if !parse_diagnostics.is_empty() {
            return Err(locate(parse_diagnostics));
        }

        let mut arena = self.base.clone();
        let (blocks, fun_map, strings) = compile_program(&mut arena, &program).map_err(locate)?;

        let module = Arc::new(arena);
        let assembly = Assembly::new(blocks, fun_map, strings, Arc::clone(&module));
        tracing::debug!(
            tag = %LogTag::Info,
            functions = assembly.fun_map().len(),
            types = module.types().len(),
            strings = assembly.strings().len(),
            "build succeeded"
        );
        self.committed = Some(module);
        Ok(assembly)
    }
}

type Lowered = (Vec<Block>, Vec<FunMapEntry>, Vec<String>);

fn compile_program(arena: &mut ModuleArena, program: &Program) -> Result<Lowered, Vec<Diagnostic>> {
    let mut diagnostics = Vec::new();

    for item in &program.items {
        if let Item::Struct(decl) = item {
            if let Err(diag) = register_struct(arena, decl) {
                diagnostics.push(diag);
            }
        }
    }

    let mut scripted = Vec::new();
    for item in &program.items {
        if let Item::Function(decl) = item {
            match declare_script_function(arena, decl) {
                Ok(fun) => scripted.push((fun, decl)),
                Err(mut diags) => diagnostics.append(&mut diags),
            }
        }
    }
    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }

    let mut literals = StringLiterals::default();
    let mut typed = Vec::with_capacity(scripted.len());
    for (fun, decl) in &scripted {
        let mut checker = TypeChecker::new(arena, &mut literals);
        match checker.check_function(*fun, decl) {
            Ok(function) => typed.push(function),
            Err(mut diags) => diagnostics.append(&mut diags),
        }
    }
    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }

    for function in &typed {
        if let Some(dec) = arena.fun_decs.get_mut(function.fun.index()) {
            dec.frame.frame_byte_size = function.frame_byte_size;
        }
    }

    let blocks = canonize(arena, &typed);
    let fun_map = (0..blocks.len())
        .map(|i| FunMapEntry {
            fun: FunId(i as u32),
            block: i as u32,
        })
        .collect();
    Ok((blocks, fun_map, literals.into_vec()))
}

fn register_struct(arena: &mut ModuleArena, decl: &StructDecl) -> Result<TypeId, Diagnostic> {
    let mut fields = Vec::with_capacity(decl.fields.len());
    for field in &decl.fields {
        let ty = arena.types().type_by_name(&field.type_ref.name).ok_or_else(|| {
            Diagnostic::error_with_code(
                error_codes::UNKNOWN_TYPE,
                format!("Unknown type '{}'", field.type_ref.name),
                field.type_ref.span,
            )
            .with_label("type not found")
            .with_help("struct fields may only use types declared before the struct")
        })?;
        fields.push((field.name.name.as_str(), ty));
    }

    arena
        .types
        .register_type(&decl.name.name, &fields)
        .map_err(|e| {
            let code = match e {
                TypeError::Duplicate(_) => error_codes::DUPLICATE_TYPE,
                TypeError::EmptyStruct(_) => error_codes::EMPTY_STRUCT,
                TypeError::DuplicateField { .. } => error_codes::DUPLICATE_FIELD,
                TypeError::VoidField { .. } => error_codes::VOID_VALUE,
                TypeError::UnknownType { .. } => error_codes::UNKNOWN_TYPE,
            };
            Diagnostic::error_with_code(code, capitalize(&e.to_string()), decl.name.span)
        })
}

fn declare_script_function(arena: &mut ModuleArena, decl: &FunctionDecl) -> Result<FunId, Vec<Diagnostic>> {
    let mut diagnostics = Vec::new();

    let names = std::iter::once(&decl.name).chain(decl.params.iter().map(|p| &p.name));
    for name in names {
        if let Err(e) = StringPool::test_string_length(&name.name) {
            diagnostics.push(Diagnostic::error_with_code(
                error_codes::NAME_TOO_LONG,
                e.to_string(),
                name.span,
            ));
        }
    }

    let mut resolve = |type_ref: &crate::ast::TypeRef| {
        let ty = arena.types().type_by_name(&type_ref.name);
        if ty.is_none() {
            diagnostics.push(
                Diagnostic::error_with_code(
                    error_codes::UNKNOWN_TYPE,
                    format!(
                        "Unknown type '{}' in declaration of '{}'",
                        type_ref.name, decl.name.name
                    ),
                    type_ref.span,
                )
                .with_label("type not found"),
            );
        }
        ty
    };
    let arg_types: Vec<Option<TypeId>> = decl.params.iter().map(|p| resolve(&p.type_ref)).collect();
    let return_type = resolve(&decl.return_type);

    let (Some(arg_types), Some(return_type)) = (
        arg_types.into_iter().collect::<Option<Vec<_>>>(),
        return_type,
    ) else {
        return Err(diagnostics);
    };
    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }

    if let Some(existing) = arena.find_signature(&decl.name.name, &arg_types) {
        let previous = arena
            .fun_dec(existing)
            .map(|dec| {
                let kind = if dec.is_intrinsic() { "intrinsic" } else { "function" };
                format!("previously declared as {} {}", kind, arena.signature(dec))
            })
            .unwrap_or_default();
        return Err(vec![Diagnostic::error_with_code(
            error_codes::DUPLICATE_FUNCTION,
            format!(
                "Function '{}' is already declared with the same argument types",
                decl.name.name
            ),
            decl.name.span,
        )
        .with_label("duplicate signature")
        .with_note(previous)]);
    }

    let declared = pool_and_declare(arena, decl, &arg_types, return_type);
    declared.map_err(|e| {
        let (code, span) = match &e {
            DeclareError::VoidArgument { arg, .. } => (error_codes::VOID_ARGUMENT, param_span(decl, arg)),
            DeclareError::DuplicateArgument { arg, .. } => {
                (error_codes::DUPLICATE_ARGUMENT, param_span(decl, arg))
            }
            DeclareError::MethodWithoutReceiver { .. } => (error_codes::SYNTAX_ERROR, decl.name.span),
            DeclareError::String(_) => (error_codes::NAME_TOO_LONG, decl.name.span),
        };
        vec![Diagnostic::error_with_code(code, capitalize(&e.to_string()), span)]
    })
}

fn pool_and_declare(
    arena: &mut ModuleArena,
    decl: &FunctionDecl,
    arg_types: &[TypeId],
    return_type: TypeId,
) -> Result<FunId, DeclareError> {
    let name = arena.strings.allocate(&decl.name.name)?;
    let mut args = Vec::with_capacity(decl.params.len());
    for (param, ty) in decl.params.iter().zip(arg_types) {
        args.push(ArgDec {
            name: arena.strings.allocate(&param.name.name)?,
            ty: *ty,
        });
    }
    arena.declare_function(name, args, return_type, false, decl.span)
}

/// Span of the last parameter called `name`
fn param_span(decl: &FunctionDecl, name: &str) -> crate::span::Span {
    decl.params
        .iter()
        .rev()
        .find(|p| p.name.name == name)
        .map(|p| p.span)
        .unwrap_or(decl.name.span)
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn build(source: &str) -> Result<Assembly, Vec<Diagnostic>> {
        BlockScriptBuilder::default().build(source)
    }

    fn codes(source: &str) -> Vec<String> {
        build(source)
            .err()
            .unwrap_or_default()
            .into_iter()
            .map(|d| d.code)
            .collect()
    }

    #[test]
    fn test_build_assigns_one_block_per_declaration() {
        let assembly = build(
            "struct Pair { a : int; b : int; };\n\
             sum(p : Pair) : int { return p.a + p.b; }\n\
             main() : int { return sum(Pair(1, 2)); }",
        )
        .unwrap();
        assert_eq!(assembly.fun_map().len(), 2);
        assert_eq!(assembly.blocks().len(), 2);
        assert_eq!(assembly.fun_name(FunId(1)), "main");
    }

    #[test]
    fn test_frame_size_covers_locals_and_temporaries() {
        let assembly = build("f(a : int) : int { b : int = a; c : float3; return b; }").unwrap();
        let dec = assembly.fun_dec(FunId(0)).unwrap();
        assert_eq!(dec.desc.input_args_byte_size, 4);
        assert_eq!(dec.frame.frame_byte_size, 4 + 4 + 12);
    }

    #[rstest]
    #[case("f() : int { return 1; } f() : int { return 2; }", error_codes::DUPLICATE_FUNCTION)]
    #[case("struct A { x : int; }; struct A { y : int; };", error_codes::DUPLICATE_TYPE)]
    #[case("struct A { x : int; x : float; };", error_codes::DUPLICATE_FIELD)]
    #[case("struct A { };", error_codes::EMPTY_STRUCT)]
    #[case("struct A { b : B; };", error_codes::UNKNOWN_TYPE)]
    #[case("f(x : void) : void { }", error_codes::VOID_ARGUMENT)]
    #[case("f(x : int, x : int) : void { }", error_codes::DUPLICATE_ARGUMENT)]
    #[case("f(x : vec9) : void { }", error_codes::UNKNOWN_TYPE)]
    #[case("f() : vec9 { }", error_codes::UNKNOWN_TYPE)]
    fn test_declaration_errors(#[case] source: &str, #[case] code: &str) {
        assert_eq!(codes(source), vec![code.to_string()]);
    }

    #[test]
    fn test_name_too_long() {
        let name = "f".repeat(64);
        let source = format!("{}() : void {{ }}", name);
        assert_eq!(codes(&source), vec![error_codes::NAME_TOO_LONG.to_string()]);
    }

    #[test]
    fn test_lex_errors_stop_the_build() {
        let diags = build("f() : int { return 1 & 2; }").unwrap_err();
        assert!(diags.iter().all(|d| d.code.starts_with("BS1")));
    }

    #[test]
    fn test_failed_build_keeps_previous_commit() {
        let mut builder = BlockScriptBuilder::default();
        builder.build("struct P { x : int; }; f() : void { }").unwrap();
        assert!(builder.type_by_name("P").is_some());
        builder.build("g() : int { }").unwrap_err();
        assert!(builder.type_by_name("P").is_some());
        assert!(builder.arena().types().type_by_name("P").is_none());
    }

    #[test]
    fn test_host_type_rejects_script_struct_field() {
        let mut builder = BlockScriptBuilder::default();
        builder.build("struct P { x : int; }; f() : void { }").unwrap();
        let p = builder.type_by_name("P").unwrap();
        assert!(matches!(
            builder.register_type("Host", &[("p", p)]),
            Err(TypeError::UnknownType { .. })
        ));
        assert!(builder.arena().types().type_by_name("Host").is_none());
    }

    #[test]
    fn test_diagnostics_are_located() {
        let diags = build("f() : int {\n  return true;\n}").unwrap_err();
        assert_eq!(diags[0].code, error_codes::TYPE_MISMATCH);
        assert_eq!(diags[0].line, 2);
        assert_eq!(diags[0].column, 10);
    }
}
