use actix_cors::Cors;
use actix_web::{delete, get, middleware, post, put, web, App, HttpResponse, HttpServer};
use chrono::NaiveDate;
use futures::TryStreamExt;
use mongodb::{bson::doc, Client, Collection};
use serde::{Deserialize, Serialize};

use tripsplit::currency::Currency;
use tripsplit::schemas::{
    Category, CompanionName, ExpenseRecord, Flight, Hotel, Trip, DEFAULT_COMPANION,
};
use tripsplit::settlement::{compute_settlement, round_to_2_decimals};
use tripsplit::transfers::plan_transfers;

fn trips(client: &Client) -> Collection<Trip> {
    client.database("TripSplit").collection("Trips")
}

#[derive(Deserialize, Serialize)]
struct TripNameJson {
    name: String,
}

#[derive(Deserialize, Serialize)]
struct TripInfoJson {
    flights: Vec<Flight>,
    hotel: Option<Hotel>,
}

#[derive(Deserialize, Serialize)]
struct CompanionJson {
    name: String,
}

#[derive(Deserialize)]
struct NewExpenseJson {
    name: String,
    date: String,
    category: Category,
    amount: f64,
    #[serde(default)]
    currency: Currency,
    payer: CompanionName,
    splits: Vec<CompanionName>,
}

// All input validation happens here, at the ingestion boundary. By the time a
// record is stored, the settlement engine can assume it is well formed.
fn build_record(json: NewExpenseJson, roster: &[CompanionName]) -> Result<ExpenseRecord, String> {
    let name = json.name.trim();
    if name.is_empty() {
        return Err("The expense needs a non-empty name".to_owned());
    }
    if NaiveDate::parse_from_str(&json.date, "%Y-%m-%d").is_err() {
        return Err("The expense date must look like YYYY-MM-DD".to_owned());
    }
    if !json.amount.is_finite() || json.amount <= 0.0 {
        return Err("The expense amount must be a positive number".to_owned());
    }
    if !roster.contains(&json.payer) {
        return Err(format!("{} is not in the companion list", json.payer));
    }

    let mut splits = Vec::new();
    for split in json.splits {
        if !splits.contains(&split) {
            splits.push(split);
        }
    }
    if splits.is_empty() {
        return Err("The expense needs at least one companion to split it".to_owned());
    }

    let amount = json.currency.to_krw(json.amount);
    let per_person_share = round_to_2_decimals(amount / splits.len() as f64);
    Ok(ExpenseRecord {
        id: bson::oid::ObjectId::new().to_hex(),
        name: name.to_owned(),
        date: json.date,
        category: json.category,
        amount,
        currency: json.currency,
        entered_amount: Some(json.amount),
        payer: json.payer,
        splits,
        per_person_share: Some(per_person_share),
    })
}

#[get("/trips")]
async fn list_trips(client: web::Data<Client>) -> HttpResponse {
    let cursor = match trips(&client).find(None, None).await {
        Ok(cursor) => cursor,
        Err(err) => return HttpResponse::InternalServerError().body(err.to_string()),
    };
    match cursor.try_collect::<Vec<Trip>>().await {
        Ok(found) => HttpResponse::Ok().json(found),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

#[put("/trips/{id}")]
async fn add_trip(
    client: web::Data<Client>,
    id: web::Path<String>,
    json: web::Json<TripNameJson>,
) -> HttpResponse {
    let trip = Trip {
        name: json.into_inner().name,
        id: id.into_inner(),
        flights: vec![],
        hotel: None,
        companions: vec![DEFAULT_COMPANION.to_owned()],
        expenses: vec![],
    };
    match trips(&client).insert_one(trip, None).await {
        Ok(_) => HttpResponse::Ok().body("Trip added"),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

#[get("/trips/{id}")]
async fn get_trip(client: web::Data<Client>, id: web::Path<String>) -> HttpResponse {
    match trips(&client)
        .find_one(doc! { "id": id.into_inner() }, None)
        .await
    {
        Ok(Some(trip)) => HttpResponse::Ok().json(trip),
        Ok(None) => HttpResponse::NotFound().body("Couldn't find the desired trip"),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

#[put("/trips/{id}/info")]
async fn set_trip_info(
    client: web::Data<Client>,
    id: web::Path<String>,
    json: web::Json<TripInfoJson>,
) -> HttpResponse {
    let info = json.into_inner();
    let update = doc! { "$set": {
        "flights": bson::to_bson(&info.flights).unwrap(),
        "hotel": bson::to_bson(&info.hotel).unwrap(),
    }};
    match trips(&client)
        .update_one(doc! { "id": id.into_inner() }, update, None)
        .await
    {
        Ok(result) if result.matched_count == 0 => {
            HttpResponse::NotFound().body("Couldn't find the desired trip")
        }
        Ok(_) => HttpResponse::Ok().body("Trip info updated"),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

#[post("/trips/{id}/companions")]
async fn add_companion(
    client: web::Data<Client>,
    id: web::Path<String>,
    json: web::Json<CompanionJson>,
) -> HttpResponse {
    let name = json.into_inner().name.trim().to_owned();
    if name.is_empty() {
        return HttpResponse::BadRequest().body("The companion needs a non-empty name");
    }
    // $addToSet keeps the roster free of duplicates without reading first.
    match trips(&client)
        .update_one(
            doc! { "id": id.into_inner() },
            doc! { "$addToSet": { "companions": name } },
            None,
        )
        .await
    {
        Ok(result) if result.matched_count == 0 => {
            HttpResponse::NotFound().body("Couldn't find the desired trip")
        }
        Ok(_) => HttpResponse::Ok().body("Companion added"),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

#[delete("/trips/{id}/companions")]
async fn clear_companions(client: web::Data<Client>, id: web::Path<String>) -> HttpResponse {
    // Wholesale replacement is the only way companions leave a roster. The
    // expenses stay behind; their payers become orphans in the settlement.
    match trips(&client)
        .update_one(
            doc! { "id": id.into_inner() },
            doc! { "$set": { "companions": [DEFAULT_COMPANION] } },
            None,
        )
        .await
    {
        Ok(result) if result.matched_count == 0 => {
            HttpResponse::NotFound().body("Couldn't find the desired trip")
        }
        Ok(_) => HttpResponse::Ok().body("Companion list cleared"),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

#[post("/trips/{id}/expenses")]
async fn add_expense(
    client: web::Data<Client>,
    id: web::Path<String>,
    json: web::Json<NewExpenseJson>,
) -> HttpResponse {
    let trips = trips(&client);
    let id = id.into_inner();
    let trip = match trips.find_one(doc! { "id": &id }, None).await {
        Ok(Some(trip)) => trip,
        Ok(None) => return HttpResponse::NotFound().body("Couldn't find the desired trip"),
        Err(err) => return HttpResponse::InternalServerError().body(err.to_string()),
    };
    let record = match build_record(json.into_inner(), &trip.companions) {
        Ok(record) => record,
        Err(reason) => return HttpResponse::BadRequest().body(reason),
    };
    match trips
        .update_one(
            doc! { "id": id },
            doc! { "$push": { "expenses": bson::to_bson(&record).unwrap() } },
            None,
        )
        .await
    {
        Ok(_) => HttpResponse::Ok().json(record),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

#[get("/trips/{id}/expenses")]
async fn list_expenses(client: web::Data<Client>, id: web::Path<String>) -> HttpResponse {
    match trips(&client)
        .find_one(doc! { "id": id.into_inner() }, None)
        .await
    {
        Ok(Some(trip)) => {
            let mut expenses = trip.expenses;
            sort_by_recency(&mut expenses);
            HttpResponse::Ok().json(expenses)
        }
        Ok(None) => HttpResponse::NotFound().body("Couldn't find the desired trip"),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

#[delete("/trips/{id}/expenses/{expense_id}")]
async fn delete_expense(
    client: web::Data<Client>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (id, expense_id) = path.into_inner();
    match trips(&client)
        .update_one(
            doc! { "id": id },
            doc! { "$pull": { "expenses": { "id": expense_id } } },
            None,
        )
        .await
    {
        Ok(result) if result.matched_count == 0 => {
            HttpResponse::NotFound().body("Couldn't find the desired trip")
        }
        Ok(result) if result.modified_count == 0 => {
            HttpResponse::NotFound().body("Couldn't find the desired expense")
        }
        Ok(_) => HttpResponse::Ok().body("Expense deleted"),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

#[get("/trips/{id}/settlement")]
async fn get_settlement(client: web::Data<Client>, id: web::Path<String>) -> HttpResponse {
    match trips(&client)
        .find_one(doc! { "id": id.into_inner() }, None)
        .await
    {
        Ok(Some(trip)) => {
            let mut expenses = trip.expenses;
            sort_by_recency(&mut expenses);
            match compute_settlement(&trip.companions, &expenses) {
                Ok(settlement) => HttpResponse::Ok().json(settlement),
                Err(err) => HttpResponse::UnprocessableEntity().body(err.to_string()),
            }
        }
        Ok(None) => HttpResponse::NotFound().body("Couldn't find the desired trip"),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

#[get("/trips/{id}/transfers")]
async fn get_transfers(client: web::Data<Client>, id: web::Path<String>) -> HttpResponse {
    match trips(&client)
        .find_one(doc! { "id": id.into_inner() }, None)
        .await
    {
        Ok(Some(trip)) => {
            let mut expenses = trip.expenses;
            sort_by_recency(&mut expenses);
            match compute_settlement(&trip.companions, &expenses) {
                Ok(settlement) => HttpResponse::Ok().json(plan_transfers(&expenses, &settlement)),
                Err(err) => HttpResponse::UnprocessableEntity().body(err.to_string()),
            }
        }
        Ok(None) => HttpResponse::NotFound().body("Couldn't find the desired trip"),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

// ISO dates compare correctly as strings, newest first.
fn sort_by_recency(expenses: &mut [ExpenseRecord]) {
    expenses.sort_by(|a, b| b.date.cmp(&a.date));
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let uri = std::env::var("MONGODB_URI").expect("You need to add the MONGODB_URI to the env");
    log::info!("Using the following URI: {}", uri);

    let client = Client::with_uri_str(uri).await.expect("failed to connect");
    log::info!("Connected");

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(Cors::permissive())
            .app_data(web::Data::new(client.clone()))
            .service(list_trips)
            .service(add_trip)
            .service(get_trip)
            .service(set_trip_info)
            .service(add_companion)
            .service(clear_companions)
            .service(add_expense)
            .service(list_expenses)
            .service(delete_expense)
            .service(get_settlement)
            .service(get_transfers)
    })
    .bind(("0.0.0.0", 8080))?
    .run()
    .await
}
