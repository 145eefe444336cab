//! # 错误派生宏
//!
//! 提供 `#[derive(Error)]` 过程宏，为错误枚举自动实现
//! `Display`、`error::ErrorKind` 和 `std::error::Error`。
//!
//! ## 使用方法
//!
//! ```rust,ignore
//! use error::Error;
//!
//! #[derive(Debug, Error)]
//! enum ProvisionError {
//!     #[code(7001)]
//!     #[error("身份登记簿不可读: {0}")]
//!     RegistryUnreadable(String),
//!
//!     #[error("签发失败: {identifier}")]
//!     IssueFailed { identifier: String, output: String },
//!
//!     #[error("未知错误")]
//!     Unknown,
//! }
//! ```
//!
//! ## 功能说明
//!
//! - `#[error("...")]` 指定消息，支持 `{0}` 位置参数和 `{field}` 命名字段
//! - `#[code(N)]` 指定错误码，未指定时按变体顺序从 1 开始编号
//! - 消息中未引用的字段不会被绑定

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Ident, Lit, LitInt, Variant};

/// 读取 `#[error("...")]` 中的消息模板
fn message_template(variant: &Variant) -> String {
    variant
        .attrs
        .iter()
        .find_map(|attr| {
            if !attr.path().is_ident("error") {
                return None;
            }
            match attr.parse_args::<Lit>() {
                Ok(Lit::Str(lit_str)) => Some(lit_str.value()),
                _ => None,
            }
        })
        .unwrap_or_else(|| format!("错误: {}", variant.ident))
}

/// 读取 `#[code(N)]` 中的错误码
fn explicit_code(variant: &Variant) -> syn::Result<Option<u32>> {
    for attr in &variant.attrs {
        if attr.path().is_ident("code") {
            let lit: LitInt = attr.parse_args()?;
            return Ok(Some(lit.base10_parse::<u32>()?));
        }
    }
    Ok(None)
}

/// 把模板中的 `{key}` 占位符依出现顺序替换为 `{}`
///
/// 返回替换后的格式串，以及每个 `{}` 对应的 key 下标。
fn positional_template(template: &str, keys: &[String]) -> (String, Vec<usize>) {
    let mut format_str = template.to_string();
    let mut order = Vec::new();

    loop {
        let next = keys
            .iter()
            .enumerate()
            .filter_map(|(i, key)| {
                let pattern = format!("{{{}}}", key);
                format_str.find(&pattern).map(|pos| (pos, i, pattern.len()))
            })
            .min_by_key(|(pos, _, _)| *pos);

        match next {
            Some((pos, index, len)) => {
                format_str.replace_range(pos..pos + len, "{}");
                order.push(index);
            }
            None => break,
        }
    }

    (format_str, order)
}

/// Error 派生宏
///
/// # 属性
///
/// - `#[error("消息")]` - 错误消息模板
/// - `#[code(N)]` - 错误码（可选）
#[proc_macro_derive(Error, attributes(error, code))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let variants = match &input.data {
        Data::Enum(data) => &data.variants,
        _ => {
            return syn::Error::new_spanned(&input, "Error 派生宏只能用于枚举类型")
                .to_compile_error()
                .into();
        }
    };

    let mut display_arms = Vec::new();
    let mut error_code_arms = Vec::new();

    for (idx, variant) in variants.iter().enumerate() {
        let variant_name = &variant.ident;
        let template = message_template(variant);

        let code = match explicit_code(variant) {
            Ok(Some(code)) => code,
            Ok(None) => idx as u32 + 1,
            Err(err) => return err.to_compile_error().into(),
        };

        match &variant.fields {
            Fields::Named(fields) => {
                let idents: Vec<Ident> = fields
                    .named
                    .iter()
                    .filter_map(|f| f.ident.clone())
                    .collect();
                let keys: Vec<String> = idents.iter().map(|i| i.to_string()).collect();
                let (format_str, order) = positional_template(&template, &keys);

                let mut bound: Vec<&Ident> = order.iter().map(|&i| &idents[i]).collect();
                let format_args = bound.clone();
                bound.sort();
                bound.dedup();

                if bound.is_empty() {
                    display_arms.push(quote! {
                        Self::#variant_name { .. } => write!(f, #format_str)
                    });
                } else {
                    display_arms.push(quote! {
                        Self::#variant_name { #(#bound,)* .. } => {
                            write!(f, #format_str, #(#format_args),*)
                        }
                    });
                }
                error_code_arms.push(quote! { Self::#variant_name { .. } => #code });
            }
            Fields::Unnamed(fields) => {
                let count = fields.unnamed.len();
                let keys: Vec<String> = (0..count).map(|i| i.to_string()).collect();
                let (format_str, order) = positional_template(&template, &keys);

                let field_ident = |i: usize| Ident::new(&format!("_field{}", i), Span::call_site());
                let patterns: Vec<_> = (0..count)
                    .map(|i| {
                        if order.contains(&i) {
                            let ident = field_ident(i);
                            quote! { #ident }
                        } else {
                            quote! { _ }
                        }
                    })
                    .collect();
                let format_args: Vec<Ident> = order.iter().map(|&i| field_ident(i)).collect();

                if order.is_empty() {
                    display_arms.push(quote! {
                        Self::#variant_name(..) => write!(f, #format_str)
                    });
                } else {
                    display_arms.push(quote! {
                        Self::#variant_name(#(#patterns),*) => {
                            write!(f, #format_str, #(#format_args),*)
                        }
                    });
                }
                error_code_arms.push(quote! { Self::#variant_name(..) => #code });
            }
            Fields::Unit => {
                display_arms.push(quote! {
                    Self::#variant_name => write!(f, #template)
                });
                error_code_arms.push(quote! { Self::#variant_name => #code });
            }
        }
    }

    let expanded = quote! {
        impl ::std::fmt::Display for #name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    #(#display_arms,)*
                }
            }
        }

        impl ::error::ErrorKind for #name {
            fn error_code(&self) -> u32 {
                match self {
                    #(#error_code_arms,)*
                }
            }

            fn error_message(&self) -> String {
                self.to_string()
            }
        }

        impl ::std::error::Error for #name {}
    };

    TokenStream::from(expanded)
}
