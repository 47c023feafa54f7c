//! Procedural macros for agentloom
//!
//! This crate provides the `#[tool]` attribute that turns a plain Rust
//! function into an agent tool, deriving its descriptor from the signature.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{
    parse_macro_input, Attribute, Expr, FnArg, GenericArgument, Ident, ItemFn, LitStr, Pat,
    PathArguments, ReturnType, Token, Type,
};

/// Converts a Rust function into an agent tool.
///
/// The tool is named after the function and described by its doc comments
/// (or by a string given to the attribute). Parameters become arguments:
///
/// - `#[arg("...")]` sets the argument description
/// - `#[arg(default = <json>)]` makes the argument optional with that default
/// - `Option<T>` parameters are optional and default to null
/// - every other parameter is required
///
/// A `{Name}Tool` type is generated next to the function, exposing
/// `descriptor()` and `as_tool()`.
///
/// # Examples
///
/// ```rust,ignore
/// use agentloom_macros::tool;
///
/// /// Greets a person by name
/// #[tool(system_prompt = "Greet everyone who joins")]
/// fn greet(#[arg("Who to greet")] name: String, #[arg(default = "Hello")] greeting: String) -> String {
///     format!("{greeting}, {name}!")
/// }
///
/// #[tool("Searches the web for information")]
/// async fn web_search(query: String, max_results: Option<u32>) -> anyhow::Result<Vec<String>> {
///     Ok(vec![])
/// }
///
/// let tool = GreetTool::as_tool();
/// ```
#[proc_macro_attribute]
pub fn tool(attr: TokenStream, item: TokenStream) -> TokenStream {
    let options = parse_macro_input!(attr as ToolOptions);
    let input_fn = parse_macro_input!(item as ItemFn);

    expand(options, input_fn)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[derive(Default)]
struct ToolOptions {
    description: Option<LitStr>,
    name: Option<LitStr>,
    system_prompt: Option<LitStr>,
}

enum OptionItem {
    Description(LitStr),
    Named(Ident, LitStr),
}

impl Parse for OptionItem {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.peek(LitStr) {
            return Ok(OptionItem::Description(input.parse()?));
        }
        let key: Ident = input.parse()?;
        input.parse::<Token![=]>()?;
        Ok(OptionItem::Named(key, input.parse()?))
    }
}

impl Parse for ToolOptions {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut options = ToolOptions::default();
        for item in Punctuated::<OptionItem, Token![,]>::parse_terminated(input)? {
            match item {
                OptionItem::Description(text) => options.description = Some(text),
                OptionItem::Named(key, value) => match key.to_string().as_str() {
                    "description" => options.description = Some(value),
                    "name" => options.name = Some(value),
                    "system_prompt" => options.system_prompt = Some(value),
                    other => {
                        return Err(syn::Error::new(
                            key.span(),
                            format!("unknown #[tool] option `{other}`"),
                        ))
                    }
                },
            }
        }
        Ok(options)
    }
}

/// Contents of a `#[arg(...)]` parameter attribute
#[derive(Default)]
struct ArgOptions {
    description: Option<LitStr>,
    default: Option<Expr>,
}

enum ArgItem {
    Description(LitStr),
    Default(Expr),
}

impl Parse for ArgItem {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.peek(LitStr) {
            return Ok(ArgItem::Description(input.parse()?));
        }
        let key: Ident = input.parse()?;
        if key != "default" {
            return Err(syn::Error::new(
                key.span(),
                format!("unknown #[arg] option `{key}`"),
            ));
        }
        input.parse::<Token![=]>()?;
        Ok(ArgItem::Default(input.parse()?))
    }
}

struct Param {
    ident: Ident,
    name: String,
    ty: Type,
    optional: bool,
    options: ArgOptions,
}

fn expand(options: ToolOptions, mut input_fn: ItemFn) -> syn::Result<TokenStream2> {
    let fn_ident = input_fn.sig.ident.clone();
    let tool_name = options
        .name
        .as_ref()
        .map(LitStr::value)
        .unwrap_or_else(|| fn_ident.unraw().to_string());
    let description = options
        .description
        .as_ref()
        .map(LitStr::value)
        .unwrap_or_else(|| extract_doc_comment(&input_fn.attrs));
    let is_async = input_fn.sig.asyncness.is_some();

    let mut params = Vec::new();
    for input in input_fn.sig.inputs.iter_mut() {
        let pat_type = match input {
            FnArg::Typed(pat_type) => pat_type,
            FnArg::Receiver(receiver) => {
                return Err(syn::Error::new(
                    receiver.span(),
                    "#[tool] functions cannot take `self`",
                ))
            }
        };
        let Pat::Ident(pat_ident) = &*pat_type.pat else {
            return Err(syn::Error::new(
                pat_type.pat.span(),
                "#[tool] parameters must be plain identifiers",
            ));
        };
        if let Type::Reference(reference) = &*pat_type.ty {
            return Err(syn::Error::new(
                reference.span(),
                "#[tool] parameters must be owned types",
            ));
        }

        let options = take_arg_options(&mut pat_type.attrs)?;
        let ident = pat_ident.ident.clone();
        params.push(Param {
            name: ident.unraw().to_string(),
            ident,
            optional: option_inner(&pat_type.ty).is_some(),
            ty: (*pat_type.ty).clone(),
            options,
        });
    }

    let tool_struct = format_ident!("{}Tool", to_pascal_case(&fn_ident.unraw().to_string()));
    let vis = &input_fn.vis;

    let property_inserts = params.iter().map(|param| {
        let name = &param.name;
        let base = &param.ty;
        let inner = option_inner(base).unwrap_or(base);
        let schema = schema_for_type(inner);
        let description = param
            .options
            .description
            .as_ref()
            .map(LitStr::value)
            .unwrap_or_default();
        let default = match (&param.options.default, param.optional) {
            (Some(expr), _) => quote! { .with_default(::serde_json::json!(#expr)) },
            (None, true) => quote! { .with_default(::serde_json::Value::Null) },
            (None, false) => quote! {},
        };
        quote! {
            properties.insert(
                #name.to_string(),
                #schema.described(#description) #default,
            );
        }
    });
    let required: Vec<&str> = params
        .iter()
        .filter(|param| !param.optional && param.options.default.is_none())
        .map(|param| param.name.as_str())
        .collect();

    let extractions = params.iter().map(|param| {
        let ident = &param.ident;
        let name = &param.name;
        let ty = &param.ty;
        let fallback = match (&param.options.default, param.optional) {
            (Some(expr), _) => quote! { ::serde_json::json!(#expr) },
            (None, true) => quote! { ::serde_json::Value::Null },
            (None, false) => quote! {
                return Err(::anyhow::anyhow!("missing required parameter '{}'", #name))
            },
        };
        quote! {
            let #ident: #ty = {
                let raw = match args.get(#name) {
                    Some(value) => value.clone(),
                    None => #fallback,
                };
                ::serde_json::from_value(raw)
                    .map_err(|err| ::anyhow::anyhow!("invalid parameter '{}': {}", #name, err))?
            };
        }
    });

    let arg_idents = params.iter().map(|param| &param.ident);
    let call = if is_async {
        quote! { #fn_ident(#(#arg_idents),*).await }
    } else {
        quote! { #fn_ident(#(#arg_idents),*) }
    };
    let (call, output_ty) = match &input_fn.sig.output {
        ReturnType::Default => (call, None),
        ReturnType::Type(_, ty) => match result_inner(ty) {
            Some(inner) => (quote! { #call? }, Some(inner)),
            None => (call, Some(&**ty)),
        },
    };
    let return_type = output_ty
        .and_then(json_type_name)
        .map(|name| quote! { .with_return_type(#name) });
    let system_prompt = options
        .system_prompt
        .as_ref()
        .map(|text| quote! { .with_system_prompt(#text) });

    Ok(quote! {
        #input_fn

        #vis struct #tool_struct;

        impl #tool_struct {
            /// Descriptor derived from the function signature
            #[allow(unused_mut)]
            pub fn descriptor() -> ::agentloom_core::tools::ToolSchema {
                use ::agentloom_core::tools::{ToolParameterSchema, ToolSchema};

                let mut properties = ::std::collections::HashMap::new();
                #(#property_inserts)*

                ToolSchema::new(
                    #tool_name,
                    #description,
                    ToolParameterSchema::object(
                        "",
                        properties,
                        vec![#(#required.to_string()),*],
                    ),
                )
                #system_prompt
                #return_type
            }

            pub fn as_tool() -> ::agentloom_core::tools::ToolBox {
                ::std::sync::Arc::new(#tool_struct)
            }
        }

        #[::async_trait::async_trait]
        impl ::agentloom_core::tools::Tool for #tool_struct {
            fn schema(&self) -> ::agentloom_core::tools::ToolSchema {
                Self::descriptor()
            }

            #[allow(unused_variables, clippy::let_unit_value)]
            async fn execute(
                &self,
                args: ::agentloom_core::messaging::ToolArgs,
            ) -> ::anyhow::Result<::serde_json::Value> {
                #(#extractions)*
                let result = #call;
                Ok(::serde_json::to_value(&result)?)
            }
        }
    })
}

/// Remove `#[arg(...)]` attributes from a parameter, returning their options
fn take_arg_options(attrs: &mut Vec<Attribute>) -> syn::Result<ArgOptions> {
    let mut options = ArgOptions::default();
    let mut kept = Vec::with_capacity(attrs.len());
    for attr in attrs.drain(..) {
        if !attr.path().is_ident("arg") {
            kept.push(attr);
            continue;
        }
        let items = attr.parse_args_with(Punctuated::<ArgItem, Token![,]>::parse_terminated)?;
        for item in items {
            match item {
                ArgItem::Description(text) => options.description = Some(text),
                ArgItem::Default(expr) => options.default = Some(expr),
            }
        }
    }
    *attrs = kept;
    Ok(options)
}

fn extract_doc_comment(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .filter_map(|attr| {
            if attr.path().is_ident("doc") {
                if let syn::Meta::NameValue(meta) = &attr.meta {
                    if let Expr::Lit(syn::ExprLit {
                        lit: syn::Lit::Str(s),
                        ..
                    }) = &meta.value
                    {
                        return Some(s.value().trim().to_string());
                    }
                }
            }
            None
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(type_path) => type_path.path.segments.last(),
        _ => None,
    }
}

fn first_generic(segment: &syn::PathSegment) -> Option<&Type> {
    if let PathArguments::AngleBracketed(args) = &segment.arguments {
        if let Some(GenericArgument::Type(inner)) = args.args.first() {
            return Some(inner);
        }
    }
    None
}

fn option_inner(ty: &Type) -> Option<&Type> {
    let segment = last_segment(ty)?;
    if segment.ident == "Option" {
        first_generic(segment)
    } else {
        None
    }
}

fn result_inner(ty: &Type) -> Option<&Type> {
    let segment = last_segment(ty)?;
    if segment.ident == "Result" {
        first_generic(segment)
    } else {
        None
    }
}

/// JSON schema type name for a Rust type
fn json_type_name(ty: &Type) -> Option<&'static str> {
    match ty {
        Type::Tuple(tuple) if tuple.elems.is_empty() => return None,
        Type::Array(_) | Type::Slice(_) | Type::Tuple(_) => return Some("array"),
        _ => {}
    }
    let segment = last_segment(ty)?;
    let name = match segment.ident.to_string().as_str() {
        "String" | "str" | "char" | "PathBuf" => "string",
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
        | "u128" | "usize" => "integer",
        "f32" | "f64" => "number",
        "bool" => "boolean",
        "Vec" | "VecDeque" | "HashSet" | "BTreeSet" => "array",
        "Option" => return first_generic(segment).and_then(json_type_name),
        _ => "object",
    };
    Some(name)
}

/// Expression building the parameter schema for `ty`, recursing into
/// collection item types
fn schema_for_type(ty: &Type) -> TokenStream2 {
    let type_name = json_type_name(ty).unwrap_or("object");
    let items = match ty {
        Type::Array(array) => Some(&*array.elem),
        Type::Slice(slice) => Some(&*slice.elem),
        _ if type_name == "array" => last_segment(ty).and_then(first_generic),
        _ => None,
    };
    match items {
        Some(item) => {
            let item_schema = schema_for_type(item);
            quote! { ToolParameterSchema::array("", #item_schema) }
        }
        None => quote! { ToolParameterSchema::of_type(#type_name) },
    }
}

fn to_pascal_case(s: &str) -> String {
    s.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect()
}
