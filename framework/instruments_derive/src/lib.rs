use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, parse_quote, Block, ItemFn, LitStr, ReturnType};

/// Time an async method and report it as an operation.
///
/// The operation id is the method name with the optional `prefix` prepended, for example
/// `#[conductor_instrument(prefix = "conductor_")]` on `signal_task` reports
/// `conductor_signal_task`. The method must be `async`, return a `Result` and be defined on a type
/// with a `reporter: Arc<Reporter>` field.
#[proc_macro_attribute]
pub fn conductor_instrument(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut prefix = String::new();
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("prefix") {
            let value: LitStr = meta.value()?.parse()?;
            prefix = value.value();
            Ok(())
        } else {
            Err(meta.error("unsupported conductor_instrument property"))
        }
    });
    parse_macro_input!(args with parser);

    let mut input = parse_macro_input!(input as ItemFn);

    if input.sig.asyncness.is_none() {
        return syn::Error::new_spanned(&input.sig, "conductor_instrument requires an async fn")
            .to_compile_error()
            .into();
    }

    let return_type = match &input.sig.output {
        ReturnType::Type(_, ty) => ty.clone(),
        ReturnType::Default => {
            return syn::Error::new_spanned(
                &input.sig,
                "conductor_instrument requires a function returning a Result",
            )
            .to_compile_error()
            .into();
        }
    };

    let operation_id = format!("{}{}", prefix, input.sig.ident);
    let body = &input.block;

    let instrumented: Block = parse_quote! {{
        let operation_record = conductor_load_instruments::OperationRecord::new(#operation_id);
        let response: #return_type = async #body.await;
        self.reporter.add_operation(&operation_record.finish(&response));
        response
    }};
    input.block = Box::new(instrumented);

    TokenStream::from(quote!(#input))
}
