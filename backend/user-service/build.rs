// Build script for user-service
// Compiles users_service.proto for the gRPC server, the client used by the
// end-to-end tests, and the JSON/validation derives the HTTP gateway relies on
fn main() {
    let protoc_path =
        protoc_bin_vendored::protoc_bin_path().expect("failed to find bundled protoc");
    std::env::set_var("PROTOC", protoc_path);

    println!("cargo:rerun-if-changed=../proto/services/users_service.proto");

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        // JSON bodies of the HTTP gateway; absent fields take proto defaults
        .type_attribute(".users", "#[derive(serde::Serialize, serde::Deserialize)]")
        .message_attribute(".users", "#[serde(default)]")
        .field_attribute(".users.User.role", "#[serde(with = \"crate::grpc::role_json\")]")
        // Declared request constraints
        .message_attribute(".users.CreateUserRequest", "#[derive(validator::Validate)]")
        .message_attribute(".users.LoginRequest", "#[derive(validator::Validate)]")
        .message_attribute(".users.GetUserRequest", "#[derive(validator::Validate)]")
        .message_attribute(".users.GetMeRequest", "#[derive(validator::Validate)]")
        .message_attribute(".users.ListUsersRequest", "#[derive(validator::Validate)]")
        .field_attribute(
            ".users.CreateUserRequest.username",
            "#[validate(custom(function = \"crate::validators::required\"), length(min = 3, max = 32), regex(path = *crate::validators::USERNAME_REGEX))]",
        )
        .field_attribute(
            ".users.CreateUserRequest.password",
            "#[validate(custom(function = \"crate::validators::required\"), length(min = 8, max = 72))]",
        )
        .field_attribute(
            ".users.LoginRequest.username",
            "#[validate(custom(function = \"crate::validators::required\"))]",
        )
        .field_attribute(
            ".users.LoginRequest.password",
            "#[validate(custom(function = \"crate::validators::required\"))]",
        )
        .field_attribute(".users.GetUserRequest.id", "#[validate(range(min = 1))]")
        .field_attribute(".users.ListUsersRequest.page_size", "#[validate(range(max = 100))]")
        .field_attribute(".users.ListUsersRequest.search", "#[validate(length(max = 64))]")
        .compile_protos(
            &["../proto/services/users_service.proto"],
            &["../proto/services"],
        )
        .expect("Failed to compile users_service.proto for user-service");
}
