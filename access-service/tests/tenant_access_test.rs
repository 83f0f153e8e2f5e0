mod common;

use access_service::{
    models::{Citizen, ClientAccountId, Contract, RoleCode, User},
    services::RevocationCache,
};
use axum::http::StatusCode;
use common::{body_json, get, json, TestApp};
use serde_json::{json, Value};

const FIRM: ClientAccountId = ClientAccountId(7);
const COMPANY: ClientAccountId = ClientAccountId(9);
const STRANGER: ClientAccountId = ClientAccountId(12);

/// Firm 7 keeps the books of company 9 under a contract. Account 12 is
/// unrelated. The caller owns the firm.
struct World {
    app: TestApp,
    token: String,
    firm_citizen: Citizen,
    company_citizen: Citizen,
    stranger_citizen: Citizen,
    contract: Contract,
    colleague: User,
    outsider: User,
}

fn world() -> World {
    let app = TestApp::new();
    app.store.add_client_account(FIRM, "firm");
    app.store.add_client_account(COMPANY, "company");
    app.store.add_client_account(STRANGER, "stranger");
    let contract = app.store.add_contract(FIRM, COMPANY);

    let owner = app.member("owner@firm.example", FIRM.0);
    let colleague = app.member("bookkeeper@company.example", COMPANY.0);
    let outsider = app.member("someone@stranger.example", STRANGER.0);

    let firm_citizen = app.store.add_citizen(FIRM, "Per");
    let company_citizen = app.store.add_citizen(COMPANY, "Pål");
    let stranger_citizen = app.store.add_citizen(STRANGER, "Espen");

    let token = app.access_token(&owner);
    World {
        app,
        token,
        firm_citizen,
        company_citizen,
        stranger_citizen,
        contract,
        colleague,
        outsider,
    }
}

fn ids(body: &Value) -> Vec<i64> {
    let mut ids: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_i64().unwrap())
        .collect();
    ids.sort_unstable();
    ids
}

#[tokio::test]
async fn citizen_list_covers_eligible_accounts_only() {
    let w = world();

    let response = w.app.send(get("/citizens", Some(&w.token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(ids(&body), vec![w.firm_citizen.id, w.company_citizen.id]);

    let response = w
        .app
        .send(get("/citizens?client_account_id=9", Some(&w.token)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(ids(&body), vec![w.company_citizen.id]);
}

#[tokio::test]
async fn requesting_an_ineligible_account_fails_authentication() {
    let w = world();
    let response = w
        .app
        .send(get("/citizens?client_account_id=12", Some(&w.token)))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_client_account_id_is_a_bad_request() {
    let w = world();
    let response = w
        .app
        .send(get("/citizens?client_account_id=abc", Some(&w.token)))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn citizen_reads_are_guarded() {
    let w = world();

    let response = w
        .app
        .send(get(
            &format!("/citizens/{}", w.company_citizen.id),
            Some(&w.token),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "Pål");

    let response = w
        .app
        .send(get(
            &format!("/citizens/{}", w.stranger_citizen.id),
            Some(&w.token),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = w.app.send(get("/citizens/999999", Some(&w.token))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn citizen_patch_validates_and_applies() {
    let w = world();
    let uri = format!("/citizens/{}", w.firm_citizen.id);

    let response = w
        .app
        .send(json("PATCH", &uri, Some(&w.token), json!({ "age": 41, "salary": 550000 })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["age"], 41);
    assert_eq!(body["salary"], 550000);

    let response = w
        .app
        .send(json("PATCH", &uri, Some(&w.token), json!({ "age": 200 })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = w
        .app
        .send(json("PATCH", &uri, Some(&w.token), json!({ "age": "old" })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = w
        .app
        .send(json(
            "PATCH",
            &format!("/citizens/{}", w.stranger_citizen.id),
            Some(&w.token),
            json!({ "age": 30 }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn client_accounts_and_sequences() {
    let w = world();

    let response = w.app.send(get("/client-accounts", Some(&w.token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(ids(&body), vec![FIRM.0, COMPANY.0]);

    let response = w
        .app
        .send(get(&format!("/client-accounts/{}", STRANGER.0), Some(&w.token)))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let uri = "/client-accounts/9/sequences/sale_invoice";
    for expected in [10_000, 10_001] {
        let response = w.app.send(json("POST", uri, Some(&w.token), json!({}))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["value"], expected);
        assert_eq!(body["kind"], "sale_invoice");
    }

    let response = w
        .app
        .send(json(
            "POST",
            "/client-accounts/9/sequences/tax_return",
            Some(&w.token),
            json!({}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = w
        .app
        .send(json(
            "POST",
            "/client-accounts/12/sequences/journal",
            Some(&w.token),
            json!({}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn contracts_cannot_be_moved_outside_eligible_accounts() {
    let w = world();

    let response = w.app.send(get("/contracts", Some(&w.token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(ids(&body_json(response).await), vec![w.contract.id]);

    let response = w
        .app
        .send(json(
            "PATCH",
            &format!("/contracts/{}", w.contract.id),
            Some(&w.token),
            json!({ "client_account_id": STRANGER.0 }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn user_profiles_follow_shared_accounts() {
    let w = world();

    let response = w
        .app
        .send(get(&format!("/users/{}", w.colleague.id), Some(&w.token)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["email"], "bookkeeper@company.example");

    let response = w
        .app
        .send(get(&format!("/users/{}", w.outsider.id), Some(&w.token)))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deactivated_membership_disappears() {
    let w = world();

    let response = w
        .app
        .send(get("/client-account-users?client_account_id=9", Some(&w.token)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["role_code"], RoleCode::AA.as_str());
    let membership_id = rows[0]["id"].as_i64().unwrap();
    let uri = format!("/client-account-users/{}", membership_id);

    let response = w
        .app
        .send(json("PATCH", &uri, Some(&w.token), json!({ "is_active": false })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = w.app.send(get(&uri, Some(&w.token))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_or_revoked_tokens_are_rejected() {
    let w = world();

    let response = w.app.send(get("/citizens", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = w.app.send(get("/citizens", Some("not-a-jwt"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    w.app.cache.deny(&w.token, 3600).await.unwrap();
    let response = w.app.send(get("/citizens", Some(&w.token))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_reports_both_dependencies() {
    let w = world();
    let mut request = get("/health", None);
    request
        .headers_mut()
        .insert("x-request-id", "health-check-1".parse().unwrap());
    let response = w.app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "health-check-1");
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "up");
    assert_eq!(body["revocation_cache"], "up");
}

#[tokio::test]
async fn client_account_slug_must_be_unique() {
    let w = world();

    let response = w
        .app
        .send(json(
            "PATCH",
            "/client-accounts/9",
            Some(&w.token),
            json!({ "unique_name": "Firm AS" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = w
        .app
        .send(get("/client-accounts/9", Some(&w.token)))
        .await;
    assert_eq!(body_json(response).await["unique_name"], "company");

    let response = w
        .app
        .send(json(
            "PATCH",
            "/client-accounts/9",
            Some(&w.token),
            json!({ "unique_name": "Absolutt lakk & bilverksted as" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["unique_name"],
        "absolutt-lakk-bilverksted"
    );
}

#[tokio::test]
async fn created_client_account_is_owned_by_creator() {
    let w = world();
    let draft = json!({
        "unique_name": "Nordlys Regnskap AS",
        "display_name": "Nordlys Regnskap",
        "accounting_currency": "nok"
    });

    let response = w
        .app
        .send(json("POST", "/client-accounts", Some(&w.token), draft.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["unique_name"], "nordlys-regnskap");
    assert_eq!(body["accounting_currency"], "NOK");
    let id = body["id"].as_i64().unwrap();

    let response = w.app.send(get("/client-accounts", Some(&w.token))).await;
    assert_eq!(ids(&body_json(response).await), vec![FIRM.0, COMPANY.0, id]);

    let response = w
        .app
        .send(get(
            &format!("/client-account-users?client_account_id={}", id),
            Some(&w.token),
        ))
        .await;
    let members = body_json(response).await;
    assert_eq!(members.as_array().unwrap().len(), 1);
    assert_eq!(members[0]["role_code"], "CA");

    let response = w
        .app
        .send(json("POST", "/client-accounts", Some(&w.token), draft))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn citizens_are_created_in_eligible_accounts_only() {
    let w = world();

    let response = w
        .app
        .send(json(
            "POST",
            "/citizens",
            Some(&w.token),
            json!({ "client_account_id": COMPANY.0, "name": "Kari", "age": 34 }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["id"].as_i64().unwrap();

    let response = w
        .app
        .send(get(&format!("/citizens/{}", id), Some(&w.token)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "Kari");

    let response = w
        .app
        .send(json(
            "POST",
            "/citizens",
            Some(&w.token),
            json!({ "client_account_id": STRANGER.0, "name": "Ola" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = w
        .app
        .send(json(
            "POST",
            "/citizens",
            Some(&w.token),
            json!({ "client_account_id": FIRM.0, "age": 200 }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn contracts_are_created_between_eligible_accounts_only() {
    let w = world();
    let create = |firm: i64, company: i64| {
        json(
            "POST",
            "/contracts",
            Some(&w.token),
            json!({ "accounting_client_account_id": firm, "client_account_id": company }),
        )
    };

    let response = w.app.send(create(FIRM.0, COMPANY.0)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["accounting_client_account_id"], FIRM.0);
    assert_ne!(body["id"].as_i64().unwrap(), w.contract.id);

    let response = w.app.send(create(FIRM.0, STRANGER.0)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = w.app.send(create(FIRM.0, 404)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn memberships_are_created_for_existing_users() {
    let w = world();

    let response = w
        .app
        .send(get(&format!("/users/{}", w.outsider.id), Some(&w.token)))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = w
        .app
        .send(json(
            "POST",
            "/client-account-users",
            Some(&w.token),
            json!({ "client_account_id": FIRM.0, "user_id": w.outsider.id.0, "role_code": "BK" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["is_active"], true);
    assert_eq!(body["role_code"], "BK");

    let response = w
        .app
        .send(get(&format!("/users/{}", w.outsider.id), Some(&w.token)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = w
        .app
        .send(json(
            "POST",
            "/client-account-users",
            Some(&w.token),
            json!({ "client_account_id": FIRM.0, "user_id": 99_999, "role_code": "EM" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = w
        .app
        .send(json(
            "POST",
            "/client-account-users",
            Some(&w.token),
            json!({ "client_account_id": STRANGER.0, "user_id": w.colleague.id.0, "role_code": "EM" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
