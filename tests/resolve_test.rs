//! Integration tests for document resolution.

use std::sync::Arc;

use oas_schema::{
    load_document_str, resolve, residual_markers, OpenApi, ResolveError, ResolveOptions,
    UnresolvedReason,
};

const PETSTORE: &str = r##"
openapi: 3.0.3
info:
  title: Petstore
  version: 1.0.0
paths:
  /pets:
    parameters:
      - $ref: '#/components/parameters/Limit'
    get:
      operationId: listPets
      responses:
        '200':
          description: A list of pets
          headers:
            X-Next:
              $ref: '#/components/headers/Next'
          content:
            application/json:
              schema:
                type: array
                items:
                  $ref: '#/components/schemas/Pet'
        default:
          $ref: '#/components/responses/Error'
    post:
      requestBody:
        $ref: '#/components/requestBodies/NewPet'
      responses:
        '201':
          description: Created
  /pets/{petId}:
    get:
      parameters:
        - name: petId
          in: path
          required: true
          schema:
            type: string
      responses:
        '200':
          description: A pet
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Pet'
components:
  schemas:
    Pet:
      type: object
      required: [id, name]
      properties:
        id:
          type: integer
        name:
          type: string
        tag:
          type: string
    Error:
      type: object
      required: [code, message]
      properties:
        code:
          type: integer
        message:
          type: string
  parameters:
    Limit:
      name: limit
      in: query
      schema:
        type: integer
        maximum: 100
  headers:
    Next:
      schema:
        type: string
  requestBodies:
    NewPet:
      required: true
      content:
        application/json:
          schema:
            $ref: '#/components/schemas/Pet'
  responses:
    Error:
      description: unexpected error
      content:
        application/json:
          schema:
            $ref: '#/components/schemas/Error'
"##;

fn petstore() -> OpenApi {
    load_document_str(PETSTORE).unwrap()
}

// === Petstore Tests ===

mod petstore {
    use super::*;

    #[test]
    fn fully_resolves() {
        let resolution = resolve(&petstore(), &ResolveOptions::new()).unwrap();

        assert!(resolution.is_complete());
        assert!(residual_markers(&resolution.document).unwrap().is_empty());
    }

    #[test]
    fn shares_registry_entries() {
        let resolution = resolve(&petstore(), &ResolveOptions::new()).unwrap();
        let document = &resolution.document;
        let pet = document.schema("Pet").unwrap();

        let list = document.paths["/pets"].get.as_ref().unwrap();
        let items = list.responses["200"].content["application/json"]
            .schema
            .as_ref()
            .unwrap()
            .items
            .as_ref()
            .unwrap();
        assert!(Arc::ptr_eq(items, pet));

        let single = document.paths["/pets/{petId}"].get.as_ref().unwrap();
        let schema = single.responses["200"].content["application/json"]
            .schema
            .as_ref()
            .unwrap();
        assert!(Arc::ptr_eq(schema, pet));

        let create = document.paths["/pets"].post.as_ref().unwrap();
        let body = create.request_body.as_ref().unwrap();
        assert!(body.required);
        assert!(Arc::ptr_eq(
            body.content["application/json"].schema.as_ref().unwrap(),
            pet
        ));
    }

    #[test]
    fn resolves_responses_headers_and_parameters() {
        let resolution = resolve(&petstore(), &ResolveOptions::new()).unwrap();
        let item = &resolution.document.paths["/pets"];
        let list = item.get.as_ref().unwrap();

        let error = &list.responses["default"];
        assert_eq!(error.description, "unexpected error");
        let error_schema = error.content["application/json"].schema.as_ref().unwrap();
        assert_eq!(error_schema.required, vec!["code", "message"]);

        let next = &list.responses["200"].headers["X-Next"];
        assert_eq!(
            next.schema.as_ref().unwrap().schema_type.as_deref(),
            Some("string")
        );

        assert_eq!(item.parameters[0].name, "limit");
        assert_eq!(item.parameters[0].location, "query");
    }

    #[test]
    fn keeps_metadata_and_order() {
        let document = petstore();
        let resolution = resolve(&document, &ResolveOptions::new()).unwrap();

        assert_eq!(resolution.document.openapi, "3.0.3");
        assert_eq!(resolution.document.info, document.info);
        let routes: Vec<&String> = resolution.document.paths.keys().collect();
        assert_eq!(routes, vec!["/pets", "/pets/{petId}"]);
    }

    #[test]
    fn idempotent() {
        let once = resolve(&petstore(), &ResolveOptions::new()).unwrap().document;
        let twice = resolve(&once, &ResolveOptions::new()).unwrap().document;
        assert_eq!(once, twice);
    }

    #[test]
    fn output_serializes_without_markers() {
        let resolution = resolve(&petstore(), &ResolveOptions::new()).unwrap();
        let json = serde_json::to_string(&resolution.document).unwrap();
        assert!(!json.contains("$ref"));
        assert!(json.contains(r#""operationId":"listPets""#));
    }
}

// === Missing Target Tests ===

mod missing_targets {
    use super::*;

    const GHOSTS: &str = r##"{
        "openapi": "3.0.3",
        "paths": {
            "/ghosts": {
                "get": {
                    "responses": {
                        "200": {
                            "description": "ok",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/Ghost" }
                                }
                            }
                        }
                    }
                }
            }
        },
        "components": { "schemas": { "Pet": { "type": "object" } } }
    }"##;

    #[test]
    fn left_in_place_without_error() {
        let document = load_document_str(GHOSTS).unwrap();
        let resolution = resolve(&document, &ResolveOptions::new()).unwrap();

        assert!(!resolution.is_complete());
        let unresolved = &resolution.unresolved[0];
        assert_eq!(unresolved.marker, "#/components/schemas/Ghost");
        assert_eq!(unresolved.reason, UnresolvedReason::NotFound);

        let residual = residual_markers(&resolution.document).unwrap();
        assert_eq!(residual.len(), 1);
        assert_eq!(residual[0].0, unresolved.location);
    }

    #[test]
    fn deny_unresolved_fails() {
        let document = load_document_str(GHOSTS).unwrap();
        let result = resolve(&document, &ResolveOptions::new().deny_unresolved(true));

        let err = result.unwrap_err();
        assert!(matches!(err, ResolveError::Unresolved { .. }));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.to_string(), "1 reference(s) left unresolved");
    }

    #[test]
    fn unresolved_report_serializes() {
        let document = load_document_str(GHOSTS).unwrap();
        let resolution = resolve(&document, &ResolveOptions::new()).unwrap();

        let value = serde_json::to_value(&resolution.unresolved).unwrap();
        assert_eq!(value[0]["reason"], "not_found");
        assert_eq!(
            value[0]["location"],
            "/paths/~1ghosts/get/responses/200/content/application~1json/schema"
        );
    }
}

// === Error Handling Tests ===

mod error_handling {
    use super::*;

    #[test]
    fn path_marker_is_error() {
        let document = load_document_str(
            r##"{
                "paths": { "/pets": { "$ref": "#/components/schemas/Pet" } },
                "components": { "schemas": { "Pet": { "type": "object" } } }
            }"##,
        )
        .unwrap();

        let err = resolve(&document, &ResolveOptions::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "path '/pets' uses reference '#/components/schemas/Pet': a component in 'schemas' is not a path item"
        );
    }

    #[test]
    fn unparseable_path_marker_is_error() {
        let document = load_document_str(
            r##"{ "paths": { "/pets": { "$ref": "#/components/pathItems/Pets" } } }"##,
        )
        .unwrap();

        let err = resolve(&document, &ResolveOptions::new()).unwrap_err();
        assert!(matches!(err, ResolveError::PathRef { .. }));
        assert!(err.to_string().contains("unknown category 'pathItems'"));
    }

    #[test]
    fn pure_cycle_is_error() {
        let document = load_document_str(
            r##"{
                "components": {
                    "responses": {
                        "A": { "$ref": "#/components/responses/B" },
                        "B": { "$ref": "#/components/responses/C" },
                        "C": { "$ref": "#/components/responses/A" }
                    }
                }
            }"##,
        )
        .unwrap();

        let err = resolve(&document, &ResolveOptions::new()).unwrap_err();
        match err {
            ResolveError::CircularReference { chain } => {
                assert_eq!(chain.len(), 4);
                assert_eq!(chain.first(), chain.last());
            }
            other => panic!("expected circular reference, got {:?}", other),
        }
    }
}

// === Recursion Tests ===

mod recursion {
    use super::*;

    const TREE: &str = r##"{
        "components": {
            "schemas": {
                "Tree": {
                    "type": "object",
                    "properties": {
                        "label": { "type": "string" },
                        "children": {
                            "type": "array",
                            "items": { "$ref": "#/components/schemas/Tree" }
                        }
                    }
                },
                "Forest": {
                    "type": "array",
                    "items": { "$ref": "#/components/schemas/Tree" }
                },
                "Ping": {
                    "type": "object",
                    "properties": { "pong": { "$ref": "#/components/schemas/Pong" } }
                },
                "Pong": {
                    "type": "object",
                    "properties": { "ping": { "$ref": "#/components/schemas/Ping" } }
                }
            }
        }
    }"##;

    #[test]
    fn self_recursive_schema() {
        let document = load_document_str(TREE).unwrap();
        let resolution = resolve(&document, &ResolveOptions::new()).unwrap();
        let tree = resolution.document.schema("Tree").unwrap();

        let inner = tree.properties["children"].items.as_ref().unwrap();
        assert_eq!(inner.marker(), Some("#/components/schemas/Tree"));

        // Outer references still resolve to the entry
        let forest = resolution.document.schema("Forest").unwrap();
        assert!(Arc::ptr_eq(forest.items.as_ref().unwrap(), tree));
    }

    #[test]
    fn mutually_recursive_schemas() {
        let document = load_document_str(TREE).unwrap();
        let resolution = resolve(&document, &ResolveOptions::new()).unwrap();

        let ping = resolution.document.schema("Ping").unwrap();
        let pong = &ping.properties["pong"];
        assert_eq!(pong.marker(), None);
        assert_eq!(
            pong.properties["ping"].marker(),
            Some("#/components/schemas/Ping")
        );

        let reasons: Vec<UnresolvedReason> =
            resolution.unresolved.iter().map(|u| u.reason).collect();
        assert!(reasons.iter().all(|r| *r == UnresolvedReason::Recursive));
    }

    #[test]
    fn aliased_recursion_stays_recursive_across_passes() {
        let document = load_document_str(
            r##"{
                "components": {
                    "schemas": {
                        "A": { "$ref": "#/components/schemas/B" },
                        "B": {
                            "type": "object",
                            "properties": { "x": { "$ref": "#/components/schemas/A" } }
                        }
                    }
                }
            }"##,
        )
        .unwrap();

        let first = resolve(&document, &ResolveOptions::new()).unwrap();
        let a = first.document.schema("A").unwrap();
        let b = first.document.schema("B").unwrap();
        assert!(Arc::ptr_eq(a, b));
        assert_eq!(b.properties["x"].marker(), Some("#/components/schemas/A"));
        assert_eq!(first.unresolved.len(), 1);
        assert_eq!(first.unresolved[0].location, "/components/schemas/B/properties/x");
        assert_eq!(first.unresolved[0].reason, UnresolvedReason::Recursive);

        // A is concrete now, so B inlines it one level deeper
        let second = resolve(&first.document, &ResolveOptions::new()).unwrap();
        let b = second.document.schema("B").unwrap();
        assert_eq!(b.properties["x"].marker(), None);
        assert_eq!(
            b.properties["x"].properties["x"].marker(),
            Some("#/components/schemas/A")
        );
        assert!(second
            .unresolved
            .iter()
            .all(|u| u.reason == UnresolvedReason::Recursive));
        let residual = residual_markers(&second.document).unwrap();
        assert!(residual
            .iter()
            .all(|(_, marker)| marker == "#/components/schemas/A"));
    }
}
