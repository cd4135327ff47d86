extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, parse_quote, FnArg, ItemFn, PathArguments, Type};

/// Extracts the generic arguments of the context type in the first
/// argument of a handler function, e.g. `EventHandlerContext<State, Ctx>`.
fn context_generics<'a>(
    input_fn: &'a ItemFn,
    context_name: &str,
) -> Vec<&'a syn::GenericArgument> {
    let context_arg = match input_fn
        .sig
        .inputs
        .first()
        .expect("Expected at least one argument")
    {
        FnArg::Typed(pat_type) => &*pat_type.ty,
        _ => panic!("Expected a typed argument"),
    };

    if let Type::Path(type_path) = context_arg {
        let args = &type_path
            .path
            .segments
            .last()
            .expect("Expected a type segment")
            .arguments;
        if let PathArguments::AngleBracketed(args) = args {
            args.args.iter().collect::<Vec<_>>()
        } else {
            panic!("Expected generic arguments in {}", context_name);
        }
    } else {
        panic!("Expected {} to be a type path", context_name);
    }
}

/// The context type as written on the handler, with the borrow lifetime
/// added in front. With `unit_default`, a missing block context becomes `()`.
fn context_type(input_fn: &ItemFn, unit_default: bool) -> Type {
    let mut context_type = match input_fn.sig.inputs.first() {
        Some(FnArg::Typed(pat_type)) => (*pat_type.ty).clone(),
        _ => panic!("Expected a typed context argument"),
    };
    if let Type::Path(type_path) = &mut context_type {
        if let Some(segment) = type_path.path.segments.last_mut() {
            if let PathArguments::AngleBracketed(args) = &mut segment.arguments {
                args.args.insert(0, parse_quote!('_));
                if unit_default && args.args.len() == 2 {
                    args.args.push(parse_quote!(()));
                }
            }
        }
    }
    context_type
}

#[proc_macro_attribute]
pub fn event_handler(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input_fn = parse_macro_input!(item as ItemFn);

    let fn_name = &input_fn.sig.ident;
    let struct_name = fn_name;
    let visibility = &input_fn.vis;

    let generics = context_generics(&input_fn, "EventHandlerContext");

    let event_type = match input_fn
        .sig
        .inputs
        .iter()
        .nth(1)
        .expect("Expected at least two arguments")
    {
        FnArg::Typed(pat_type) => &*pat_type.ty,
        _ => panic!("Expected the second argument to be typed"),
    };

    let function_body = &input_fn.block;
    let context_type = context_type(&input_fn, true);
    let output = &input_fn.sig.output;

    // Use the unit type as the block context when only the state is given.
    let generics_handling = if generics.len() == 1 {
        quote! { #(#generics),*, () }
    } else {
        quote! { #(#generics),* }
    };

    let expanded = quote! {
        #[derive(Clone)]
        #[allow(non_camel_case_types)]
        #visibility struct #struct_name;

        #[evm_event_stream::async_trait]
        impl evm_event_stream::event_handler::EventHandler<#generics_handling> for #struct_name {
            #[allow(unused_variables)]
            async fn handle(
                &self,
                context: #context_type,
            ) #output {
                let event: #event_type = evm_event_stream::decoder::decode_event(context.event)
                    .map_err(evm_event_stream::error::EventHandlerError::UnrecoverableError)?;
                #function_body
            }
        }
    };

    TokenStream::from(expanded)
}

#[proc_macro_attribute]
pub fn block_handler(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input_fn = parse_macro_input!(item as ItemFn);

    let fn_name = &input_fn.sig.ident;
    let struct_name = fn_name;
    let visibility = &input_fn.vis;

    let generics = context_generics(&input_fn, "BlockHandlerContext");

    let function_body = &input_fn.block;
    let context_type = context_type(&input_fn, false);
    let output = &input_fn.sig.output;

    let expanded = quote! {
        #[derive(Clone)]
        #[allow(non_camel_case_types)]
        #visibility struct #struct_name;

        #[evm_event_stream::async_trait]
        impl evm_event_stream::block_handler::BlockHandler<#(#generics),*> for #struct_name {
            async fn handle(
                &self,
                context: #context_type,
            ) #output {
                #function_body
            }
        }
    };

    TokenStream::from(expanded)
}
