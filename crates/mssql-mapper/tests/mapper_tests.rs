//! Mapper tests against an in-memory executor.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mssql_mapper::{
    column, entity, Command, Config, DbType, Entity, Executor, Mapper, MapperError, Params,
    ProcedureDef, Record, RenderedCommand, ResultTable, RowSink, SqlNullType, SqlValue,
};
use rust_decimal::Decimal;

entity! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Station as "Stations" {
        pub id: Option<i32> => column("ID").db_type(DbType::Int).ignore_on_insert(),
        pub name: Option<String> => column("Station_Name").db_type(DbType::NVarChar).length(50),
        pub latitude: Option<f64> => column("Latitude").db_type(DbType::Float),
    }
}

entity! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Trip as "dbo.Trips" {
        pub id: Option<i32> => column("Trip_ID").db_type(DbType::Int).ignore_on_insert(),
        pub duration: Option<Decimal> => column("Duration").db_type(DbType::Decimal),
        pub from_station: Option<String> => column("From_Station"),
    }
}

entity! {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct StationTotal {
        pub total: Option<i64> => column("Total"),
    }
}

entity! {
    #[derive(Debug, Default)]
    pub struct Strict as "Strict" {
        pub id: i32 => column("ID").db_type(DbType::Int),
    }
}

/// Records rendered batches and replays canned results.
#[derive(Default)]
struct FakeExecutor {
    executed: Mutex<Vec<RenderedCommand>>,
    results: Mutex<VecDeque<ResultTable>>,
}

impl FakeExecutor {
    fn with_results(results: Vec<ResultTable>) -> Arc<Self> {
        Arc::new(Self {
            executed: Mutex::new(Vec::new()),
            results: Mutex::new(results.into()),
        })
    }

    fn executed(&self) -> Vec<RenderedCommand> {
        self.executed.lock().unwrap().clone()
    }

    fn record(&self, command: &Command) -> mssql_mapper::Result<()> {
        let rendered = command.render()?;
        self.executed.lock().unwrap().push(rendered);
        Ok(())
    }

    fn next_result(&self) -> ResultTable {
        self.results.lock().unwrap().pop_front().unwrap_or_default()
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn execute(&self, command: &Command) -> mssql_mapper::Result<u64> {
        self.record(command)?;
        Ok(1)
    }

    async fn query(&self, command: &Command) -> mssql_mapper::Result<ResultTable> {
        self.record(command)?;
        Ok(self.next_result())
    }

    async fn query_each(
        &self,
        command: &Command,
        sink: &mut RowSink<'_>,
    ) -> mssql_mapper::Result<u64> {
        self.record(command)?;
        let mut count = 0;
        for row in self.next_result() {
            sink(row)?;
            count += 1;
        }
        Ok(count)
    }

    async fn ping(&self) -> mssql_mapper::Result<()> {
        Ok(())
    }
}

fn text(s: &str) -> SqlValue<'static> {
    SqlValue::from(s).into_owned()
}

fn stations_table() -> ResultTable {
    ResultTable::new(["ID", "Station_Name", "Latitude", "Docks"])
        .with_row(vec![
            SqlValue::I32(2),
            text("Buckingham Fountain"),
            SqlValue::F64(41.876),
            SqlValue::I32(39),
        ])
        .with_row(vec![
            SqlValue::I32(3),
            text("Shedd Aquarium"),
            SqlValue::Null(SqlNullType::F64),
            SqlValue::I32(55),
        ])
}

fn mapper(executor: &Arc<FakeExecutor>) -> Mapper {
    let mut mapper = Mapper::with_executor(executor.clone());
    mapper.register::<Station>().unwrap();
    mapper.register::<Trip>().unwrap();
    mapper.register::<StationTotal>().unwrap();
    mapper
}

// ===== Registration =====

#[test]
fn test_registration_state() {
    let mut mapper = Mapper::new();
    assert!(!mapper.is_registered::<Station>());
    assert!(!mapper.has_mapped_table::<Station>());

    mapper.register::<Station>().unwrap();
    mapper.register::<StationTotal>().unwrap();
    assert!(mapper.is_registered::<Station>());
    assert!(mapper.has_mapped_table::<Station>());
    assert!(mapper.is_registered::<StationTotal>());
    assert!(!mapper.has_mapped_table::<StationTotal>());

    assert!(matches!(
        mapper.register::<Station>(),
        Err(MapperError::AlreadyRegistered(_))
    ));
}

#[test]
fn test_non_nullable_property_is_rejected() {
    let mut mapper = Mapper::new();
    let err = mapper.register::<Strict>().unwrap_err();
    assert!(matches!(err, MapperError::NonNullableProperty { .. }));
    assert!(!mapper.is_registered::<Strict>());
}

#[test]
fn test_cached_statements() {
    let mut mapper = Mapper::new();
    mapper.register::<Trip>().unwrap();
    let registry = mapper.registry();
    assert_eq!(
        registry.select_sql(Trip::type_key()).unwrap(),
        "SELECT * FROM [dbo].[Trips]"
    );
    assert_eq!(
        registry.insert_sql(Trip::type_key()).unwrap(),
        "INSERT INTO [dbo].[Trips]([Duration],[From_Station]) VALUES(@Duration,@From_Station)"
    );
}

#[test]
fn test_fill() {
    let mapper = mapper(&FakeExecutor::with_results(vec![]));
    let stations: Vec<Station> = mapper.fill(&stations_table()).unwrap();
    assert_eq!(stations.len(), 2);
    assert_eq!(stations[0].name.as_deref(), Some("Buckingham Fountain"));
    assert_eq!(stations[1].latitude, None);

    let unregistered = Mapper::new();
    assert!(matches!(
        unregistered.fill::<Station>(&stations_table()),
        Err(MapperError::NotRegistered(_))
    ));
}

// ===== Queries =====

#[tokio::test]
async fn test_all_runs_cached_select() {
    let executor = FakeExecutor::with_results(vec![stations_table()]);
    let mapper = mapper(&executor);

    let stations = mapper.all::<Station>().await.unwrap();
    assert_eq!(
        stations,
        vec![
            Station {
                id: Some(2),
                name: Some("Buckingham Fountain".to_string()),
                latitude: Some(41.876),
            },
            Station {
                id: Some(3),
                name: Some("Shedd Aquarium".to_string()),
                latitude: None,
            },
        ]
    );
    assert_eq!(executor.executed()[0].sql, "SELECT * FROM [Stations]");
}

#[tokio::test]
async fn test_all_requires_registration_then_table() {
    let executor = FakeExecutor::with_results(vec![]);
    let mut mapper = Mapper::with_executor(executor.clone());
    assert!(matches!(
        mapper.all::<Station>().await,
        Err(MapperError::NotRegistered(_))
    ));

    mapper.register::<StationTotal>().unwrap();
    assert!(matches!(
        mapper.all::<StationTotal>().await,
        Err(MapperError::NoMappedTable(_))
    ));
    assert!(executor.executed().is_empty());
}

#[tokio::test]
async fn test_query_text_and_stream_agree() {
    let executor = FakeExecutor::with_results(vec![stations_table(), stations_table()]);
    let mapper = mapper(&executor);

    let buffered: Vec<Station> = mapper
        .query_text("SELECT * FROM Stations WHERE Docks > 30", false)
        .await
        .unwrap();
    let streamed: Vec<Station> = mapper
        .query_stream_text("GetAllStations", true)
        .await
        .unwrap();
    assert_eq!(buffered, streamed);

    let executed = executor.executed();
    assert_eq!(executed[0].sql, "SELECT * FROM Stations WHERE Docks > 30");
    assert_eq!(executed[1].sql, "EXEC [GetAllStations];");
}

#[tokio::test]
async fn test_query_with_parameters() {
    let executor = FakeExecutor::with_results(vec![ResultTable::new(["Total"])
        .with_row(vec![SqlValue::I32(612)])]);
    let mapper = mapper(&executor);

    let command = Command::text("SELECT COUNT(*) AS Total FROM Stations WHERE Docks > @docks")
        .with_parameter("@docks", DbType::Int, None, 20)
        .unwrap();
    let totals: Vec<StationTotal> = mapper.query(&command).await.unwrap();
    assert_eq!(totals, vec![StationTotal { total: Some(612) }]);

    let executed = executor.executed();
    assert_eq!(
        executed[0].sql,
        "DECLARE @docks INT = @P1;\nSELECT COUNT(*) AS Total FROM Stations WHERE Docks > @docks"
    );
    assert_eq!(executed[0].values, vec![SqlValue::I32(20)]);
}

#[tokio::test]
async fn test_not_connected() {
    let mut mapper = Mapper::new();
    mapper.register::<Station>().unwrap();

    assert!(matches!(
        mapper.all::<Station>().await,
        Err(MapperError::NotConnected)
    ));
    assert!(matches!(
        mapper.non_query(&Command::text("SELECT 1")).await,
        Err(MapperError::NotConnected)
    ));
    assert!(matches!(
        mapper.query_stream::<Station>(&Command::text("SELECT 1")).await,
        Err(MapperError::NotConnected)
    ));
}

// ===== Insert =====

#[tokio::test]
async fn test_insert_binds_declared_types() {
    let executor = FakeExecutor::with_results(vec![]);
    let mapper = mapper(&executor);

    let station = Station {
        id: Some(99),
        name: Some("Millennium Park".to_string()),
        latitude: None,
    };
    assert_eq!(mapper.insert(&station).await.unwrap(), 1);

    let executed = executor.executed();
    assert_eq!(
        executed[0].sql,
        "DECLARE @Station_Name NVARCHAR(50) = @P1;\n\
         DECLARE @Latitude FLOAT = @P2;\n\
         INSERT INTO [Stations]([Station_Name],[Latitude]) VALUES(@Station_Name,@Latitude)"
    );
    assert_eq!(
        executed[0].values,
        vec![text("Millennium Park"), SqlValue::Null(SqlNullType::F64)]
    );
}

#[tokio::test]
async fn test_insert_requires_column_types() {
    let executor = FakeExecutor::with_results(vec![]);
    let mapper = mapper(&executor);

    let trip = Trip {
        id: None,
        duration: Some(Decimal::from_str("845.5").unwrap()),
        from_station: Some("Canal St & Adams St".to_string()),
    };
    let err = mapper.insert(&trip).await.unwrap_err();
    match err {
        MapperError::MissingColumnType { column, .. } => assert_eq!(column, "From_Station"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(executor.executed().is_empty());
}

#[tokio::test]
async fn test_insert_requires_table() {
    let mapper = mapper(&FakeExecutor::with_results(vec![]));
    assert!(matches!(
        mapper.insert(&StationTotal { total: Some(1) }).await,
        Err(MapperError::NoMappedTable(_))
    ));
}

// ===== Stored procedures =====

fn procedures(mapper: &mut Mapper) {
    mapper
        .register_procedure(
            ProcedureDef::non_query("AddStation")
                .param("@name", DbType::NVarChar, Some(50))
                .param("@latitude", DbType::Float, None),
        )
        .unwrap();
    mapper
        .register_procedure(
            ProcedureDef::scalar("GetStationNameFromId").param("@station_id", DbType::Int, None),
        )
        .unwrap();
    mapper
        .register_procedure_for::<Station>(
            ProcedureDef::new("GetStationsNear").param("@latitude", DbType::Float, None),
        )
        .unwrap();
}

#[tokio::test]
async fn test_non_query_procedure_fills_missing_with_null() {
    let executor = FakeExecutor::with_results(vec![]);
    let mut mapper = mapper(&executor);
    procedures(&mut mapper);

    let mut params = Params::new();
    params.insert("@name".to_string(), text("Navy Pier"));
    params.insert("@unused".to_string(), SqlValue::I32(1));
    mapper
        .execute_non_query_procedure("AddStation", Some(&params))
        .await
        .unwrap();

    let executed = executor.executed();
    assert_eq!(
        executed[0].sql,
        "DECLARE @name NVARCHAR(50) = @P1;\n\
         DECLARE @latitude FLOAT = @P2;\n\
         EXEC [AddStation] @name = @name, @latitude = @latitude;"
    );
    assert_eq!(
        executed[0].values,
        vec![text("Navy Pier"), SqlValue::Null(SqlNullType::F64)]
    );
}

#[tokio::test]
async fn test_procedure_kind_is_enforced() {
    let executor = FakeExecutor::with_results(vec![]);
    let mut mapper = mapper(&executor);
    procedures(&mut mapper);

    assert!(matches!(
        mapper.execute_non_query_procedure("GetStationNameFromId", None).await,
        Err(MapperError::ProcedureKind { .. })
    ));
    assert!(matches!(
        mapper
            .execute_scalar_procedure::<Option<String>>("AddStation", None)
            .await,
        Err(MapperError::ProcedureKind { .. })
    ));
    assert!(matches!(
        mapper.execute_non_query_procedure("Missing", None).await,
        Err(MapperError::ProcedureNotRegistered(_))
    ));
    assert!(executor.executed().is_empty());
}

#[tokio::test]
async fn test_scalar_procedure() {
    let executor = FakeExecutor::with_results(vec![
        ResultTable::new([""]).with_row(vec![text("Wells St & Concord Ln")]),
        ResultTable::new([""]),
        ResultTable::new([""]).with_row(vec![SqlValue::Null(SqlNullType::I32)]),
    ]);
    let mut mapper = mapper(&executor);
    procedures(&mut mapper);

    let mut params = Params::new();
    params.insert("@station_id".to_string(), SqlValue::I32(15));
    let name: Option<String> = mapper
        .execute_scalar_procedure("GetStationNameFromId", Some(&params))
        .await
        .unwrap();
    assert_eq!(name.as_deref(), Some("Wells St & Concord Ln"));

    let empty: Option<String> = mapper
        .execute_scalar_procedure("GetStationNameFromId", None)
        .await
        .unwrap();
    assert_eq!(empty, None);

    let strict = mapper
        .execute_scalar_procedure::<i32>("GetStationNameFromId", None)
        .await;
    assert!(matches!(strict, Err(MapperError::NullValue(_))));
}

#[tokio::test]
async fn test_execute_procedure_hydrates() {
    let executor = FakeExecutor::with_results(vec![stations_table()]);
    let mut mapper = Mapper::with_executor(executor.clone());
    procedures(&mut mapper);
    assert!(mapper.is_registered::<Station>());
    assert!(mapper.is_procedure_registered("GetStationsNear"));

    let mut params = Params::new();
    params.insert("latitude".to_string(), SqlValue::F64(41.9));
    let stations: Vec<Station> = mapper
        .execute_procedure("GetStationsNear", Some(&params))
        .await
        .unwrap();
    assert_eq!(stations.len(), 2);
    assert_eq!(
        executor.executed()[0].sql,
        "DECLARE @latitude FLOAT = @P1;\nEXEC [GetStationsNear] @latitude = @latitude;"
    );

    assert!(matches!(
        mapper
            .execute_procedure::<StationTotal>("GetStationsNear", None)
            .await,
        Err(MapperError::NotRegistered(_))
    ));
}

#[test]
fn test_procedure_registered_once() {
    let mut mapper = Mapper::new();
    procedures(&mut mapper);
    assert!(matches!(
        mapper.register_procedure(ProcedureDef::new("AddStation")),
        Err(MapperError::ProcedureAlreadyRegistered(_))
    ));
    assert!(matches!(
        mapper.register_procedure_for::<Trip>(ProcedureDef::new("AddStation")),
        Err(MapperError::ProcedureAlreadyRegistered(_))
    ));
    assert!(!mapper.is_registered::<Trip>());
}

// ===== Records =====

const CONFIG: &str = r#"
entities:
  - name: Station
    table: Stations
    columns:
      - property: id
        column: ID
        type: int
        ignore_on_insert: true
      - property: name
        column: Station_Name
        type: nvarchar
        length: 50
procedures:
  - name: GetAllStations
    entity: Station
"#;

async fn record_mapper(executor: &Arc<FakeExecutor>) -> Mapper {
    let config = Config::from_yaml(CONFIG).unwrap();
    let mut mapper = Mapper::from_config(&config).await.unwrap();
    mapper.set_executor(executor.clone());
    mapper
}

#[tokio::test]
async fn test_records_round_trip() {
    let executor = FakeExecutor::with_results(vec![stations_table(), stations_table()]);
    let mapper = record_mapper(&executor).await;

    let records = mapper.all_records("Station").await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get("name"), Some(&text("Buckingham Fountain")));
    assert_eq!(records[0].get("Docks"), None);

    let mut streamed = Vec::new();
    let count = mapper
        .query_records_each("Station", &Command::text("SELECT * FROM Stations"), |r| {
            streamed.push(r);
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(count, 2);
    assert_eq!(streamed, records);
}

#[tokio::test]
async fn test_insert_record() {
    let executor = FakeExecutor::with_results(vec![]);
    let mapper = record_mapper(&executor).await;

    let def = mapper.registry().mapping("Station").unwrap().definition().clone();
    let record =
        Record::from_json(&def, &serde_json::json!({"name": "Adler Planetarium"})).unwrap();
    mapper.insert_record(&record).await.unwrap();

    let executed = executor.executed();
    assert_eq!(
        executed[0].sql,
        "DECLARE @Station_Name NVARCHAR(50) = @P1;\n\
         INSERT INTO [Stations]([Station_Name]) VALUES(@Station_Name)"
    );
    assert_eq!(executed[0].values, vec![text("Adler Planetarium")]);
}

#[tokio::test]
async fn test_execute_procedure_records() {
    let executor = FakeExecutor::with_results(vec![stations_table()]);
    let mapper = record_mapper(&executor).await;

    let records = mapper
        .execute_procedure_records("GetAllStations", "Station", None)
        .await
        .unwrap();
    assert_eq!(records[1].get("id"), Some(&SqlValue::I32(3)));
    assert_eq!(executor.executed()[0].sql, "EXEC [GetAllStations];");
}
