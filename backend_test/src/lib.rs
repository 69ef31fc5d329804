use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, Ident, ItemFn, Pat, PathArguments,
    Signature, Type,
};

/// Transform an asynchronous test into a synchronous one, inject dependencies,
/// and ensure that the database is cleared regardless of how the test terminates.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`],
/// [`mongodb::Database`], [`crate::model::mongodb::Coll<T>`], and
/// [`crate::model::api::auth::AuthHeader`]. The latter requires a login role
/// argument: `#[backend_test(user)]`, `#[backend_test(admin)]` or
/// `#[backend_test(superadmin)]` seeds the matching example account (admins
/// and users come with an example institution) and logs it in.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let (test_args, collection_idents, collection_types) = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Seed the requested account and log the client in as it.
    let seed = parse_macro_input!(args as Option<Ident>).and_then(|arg| {
        if arg == "user" {
            Some(quote! {
                let institution_id: crate::model::mongodb::Id =
                    crate::model::mongodb::Coll::<crate::model::db::institution::NewInstitution>::from_db(&db)
                        .insert_one(crate::model::db::institution::NewInstitution::example(), None)
                        .await
                        .unwrap()
                        .inserted_id
                        .as_object_id()
                        .unwrap()
                        .into();
                crate::model::mongodb::Coll::<crate::model::db::user::NewUser>::from_db(&db)
                    .insert_one(
                        crate::model::db::user::NewUser::example_user(Some(institution_id)),
                        None,
                    )
                    .await
                    .unwrap();
                let credentials = crate::model::api::auth::Credentials::example_user();
            })
        } else if arg == "admin" {
            Some(quote! {
                let institution_id: crate::model::mongodb::Id =
                    crate::model::mongodb::Coll::<crate::model::db::institution::NewInstitution>::from_db(&db)
                        .insert_one(crate::model::db::institution::NewInstitution::example(), None)
                        .await
                        .unwrap()
                        .inserted_id
                        .as_object_id()
                        .unwrap()
                        .into();
                crate::model::mongodb::Coll::<crate::model::db::user::NewUser>::from_db(&db)
                    .insert_one(
                        crate::model::db::user::NewUser::example_admin(institution_id),
                        None,
                    )
                    .await
                    .unwrap();
                let credentials = crate::model::api::auth::Credentials::example_admin();
            })
        } else if arg == "superadmin" {
            Some(quote! {
                crate::model::mongodb::Coll::<crate::model::db::user::NewUser>::from_db(&db)
                    .insert_one(crate::model::db::user::NewUser::example_superadmin(), None)
                    .await
                    .unwrap();
                let credentials = crate::model::api::auth::Credentials::example_superadmin();
            })
        } else {
            None
        }
    });

    let login = match seed {
        Some(seed) => quote! {{
            #seed
            let response = rocket_client
                .post("/auth/login")
                .header(rocket::http::ContentType::JSON)
                .body(rocket::serde::json::json!(credentials).to_string())
                .dispatch()
                .await;
            assert_eq!(
                rocket::http::Status::Ok,
                response.status(),
                "login for the seeded test account failed"
            );
            let login: crate::model::api::auth::LoginResponse =
                rocket::serde::json::serde_json::from_str(&response.into_string().await.unwrap())
                    .unwrap();
            Some(login.token)
        }},
        None => quote! { None::<String> },
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> (rocket::local::asynchronous::Client, mongodb::Database, Option<String>) {
                let db_client = crate::db_client().await;
                let db_name = crate::database();
                let rocket_client = rocket::local::asynchronous::Client::tracked(crate::rocket_for_db(db_client.clone(), &db_name).await)
                    .await
                    .unwrap();
                let db = db_client.database(&db_name);

                let auth_token = #login;

                (rocket_client, db, auth_token)
            }

            /// The test itself.
            #item_fn

            /// Test cleanup.
            async fn cleanup(db: mongodb::Database) {
                db.drop(None).await.unwrap();
            }

            // Create an async runtime. We need a separate one for inside and
            // outside the `catch_unwind`.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            // Run the setup.
            let (rocket_client, db, _auth_token) = outer_runtime.block_on(setup());

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let client_mutex = std::sync::Mutex::new(rocket_client);
            let db_mutex = std::sync::Mutex::new(db.clone());
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                let rocket_client = client_mutex.into_inner().unwrap();
                let db = db_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();

                #(
                    let #collection_idents = crate::model::mongodb::Coll::<#collection_types>::from_db(&db);
                )*

                runtime.block_on(#new_name(#(#test_args),* #(,#collection_idents)*));
            });

            // Run the cleanup.
            outer_runtime.block_on(cleanup(db));

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::panic_any(cause);
            }
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
#[allow(clippy::type_complexity)]
fn check_sig(sig: Signature) -> Result<(Vec<TokenStream2>, Vec<Ident>, Vec<Ident>), syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_db = false;
    let mut has_auth = false;
    let mut args = vec![];
    let mut collection_idents = vec![];
    let mut collection_types = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(pat_ident) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    if let Some(type_ident) = type_path.path.get_ident() {
                        if type_ident == "Client" {
                            if has_client {
                                return Err(syn::Error::new(input.span(), "Test cannot accept more than one `rocket::local::asynchronous::Client`"));
                            }
                            has_client = true;
                            args.push(quote! { rocket_client });
                            continue;
                        } else if type_ident == "Database" {
                            if has_db {
                                return Err(syn::Error::new(
                                    input.span(),
                                    "Test cannot accept more than one `mongodb::Database`",
                                ));
                            }
                            has_db = true;
                            args.push(quote! { db });
                            continue;
                        } else if type_ident == "AuthHeader" {
                            if has_auth {
                                return Err(syn::Error::new(
                                    input.span(),
                                    "Test cannot accept more than one `AuthHeader`",
                                ));
                            }
                            has_auth = true;
                            args.push(quote! {
                                crate::model::api::auth::AuthHeader(_auth_token.clone().expect(
                                    "`AuthHeader` requires a login role, e.g. `#[backend_test(user)]`",
                                ))
                            });
                            continue;
                        }
                    } else {
                        // Valid as the last path segment for any type is itself
                        let possible_collection = type_path.path.segments.last().unwrap();
                        if possible_collection.ident == "Coll" {
                            if let PathArguments::AngleBracketed(generics) =
                                &possible_collection.arguments
                            {
                                if let Some(GenericArgument::Type(Type::Path(type_path))) =
                                    generics.args.first()
                                {
                                    if let Some(type_ident) = type_path.path.get_ident() {
                                        collection_idents.push(pat_ident.ident.clone());
                                        collection_types.push(type_ident.clone());
                                        continue;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client`, `db_ident: Database`, `auth_ident: AuthHeader` or `collection_ident: Coll<T>`",
        ));
    }

    Ok((args, collection_idents, collection_types))
}
