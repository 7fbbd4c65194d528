// Integration tests: loading complete DBC files through the public API
use dbc_decoder::model::{AccessMode, AttributeLiteral, ByteOrder, MultiplexerRole, ObjectRef};
use dbc_decoder::{
    parse, parse_file, parse_with_config, DbcError, EntityKind, ParseConfig, SemanticError,
};
use std::io::Write;
use tempfile::NamedTempFile;

const POWERTRAIN: &str = r#"
VERSION "1.0"

NS_ :
    NS_DESC_
    CM_
    BA_DEF_
    BA_
    VAL_
    CAT_DEF_
    CAT_
    FILTER
    BA_DEF_DEF_
    EV_DATA_
    ENVVAR_DATA_
    SGTYPE_
    SGTYPE_VAL_
    BA_DEF_SGTYPE_
    BA_SGTYPE_
    SIG_TYPE_REF_
    VAL_TABLE_
    SIG_GROUP_
    SIG_VALTYPE_
    SIGTYPE_VALTYPE_
    BO_TX_BU_
    BA_DEF_REL_
    BA_REL_
    BA_SGTYPE_REL_
    SG_MUL_VAL_

BS_:

BU_: ECU1 ECU2 Gateway

VAL_TABLE_ GearTable 0 "P" 1 "R" 2 "N" 3 "D" ;

(* Engine data, 10 ms cycle *)
BO_ 291 EngineData: 8 ECU1
 SG_ EngineSpeed : 0|16@1+ (1,0) [0|8000] "rpm" ECU2,Gateway
 SG_ EngineTemp : 16|8@1+ (1,-40) [-40|215] "C" ECU2
 SG_ Gear : 31|4@0+ (1,0) [0|3] "" ECU2

BO_ 512 MultiplexedMsg: 8 ECU1
 SG_ Mode M : 0|8@1+ (1,0) [0|3] "" ECU2
 SG_ SignalA m0 : 8|16@1+ (1,0) [0|100] "%" ECU2
 SG_ SignalB m1 : 8|16@1+ (0.1,0) [0|1000] "mV" ECU2

BO_ 2566848533 DiagResponse: 8 Vector__XXX
 SG_ Payload : 7|64@0+ (1,0) [0|0] "" Vector__XXX

BO_TX_BU_ 291 : Gateway;

EV_ EnvPower : 0 [0|1] "" 0 1 DUMMY_NODE_VECTOR3 ECU1;

CM_ "Powertrain bus";
CM_ BU_ ECU1 "Engine controller";
CM_ BO_ 291 "Engine status";
CM_ SG_ 291 EngineSpeed "Crankshaft speed";
BA_DEF_ BO_ "GenMsgCycleTime" INT 0 65535;
BA_DEF_ "BusType" STRING ;
BA_DEF_ SG_ "GenSigStartValue" FLOAT -1000 1000;
BA_DEF_DEF_ "GenMsgCycleTime" 100;
BA_DEF_DEF_ "BusType" "CAN";
BA_DEF_DEF_ "GenSigStartValue" 0;
BA_ "GenMsgCycleTime" BO_ 291 10;
BA_ "GenSigStartValue" SG_ 291 EngineTemp 40;
VAL_ 291 Gear 0 "P" 1 "R" 2 "N" 3 "D" ;
VAL_ 512 Mode 0 "ModeA" 1 "ModeB" ;
"#;

#[test]
fn test_parse_realistic_network() {
    let _ = env_logger::builder().is_test(true).try_init();
    let network = parse(POWERTRAIN).unwrap();

    assert_eq!(network.version(), "1.0");
    assert_eq!(network.new_symbols().len(), 25);
    assert_eq!(network.nodes().len(), 3);

    let stats = network.stats();
    assert_eq!(stats.num_messages, 3);
    assert_eq!(stats.num_signals, 7);
    assert_eq!(stats.num_value_tables, 1);
    assert_eq!(stats.num_comments, 4);

    let engine = network.message(291).unwrap();
    assert_eq!(engine.name, "EngineData");
    assert_eq!(engine.sender(), Some("ECU1"));
    assert_eq!(engine.additional_transmitters, vec!["Gateway"]);
    assert_eq!(network.message_by_name("EngineData").map(|m| m.id), Some(291));

    let gear = engine.signal("Gear").unwrap();
    assert_eq!(gear.byte_order, ByteOrder::BigEndian);
    assert_eq!(gear.value_descriptions.get(3), Some("D"));

    let mux = network.message(512).unwrap();
    assert_eq!(mux.multiplexor().map(|s| s.name.as_str()), Some("Mode"));
    assert_eq!(
        mux.signal("SignalB").unwrap().multiplexer,
        MultiplexerRole::Multiplexed(1)
    );

    let diag = network.message(2566848533).unwrap();
    assert!(diag.is_extended());
    assert_eq!(diag.can_id(), 0x18FF_0015);
    assert_eq!(diag.sender(), None);

    let env = network.environment_variable("EnvPower").unwrap();
    assert_eq!(env.access_mode(), AccessMode::ReadWrite);
}

#[test]
fn test_attributes_and_comments() {
    let network = parse(POWERTRAIN).unwrap();

    assert_eq!(network.comment(&ObjectRef::Network), Some("Powertrain bus"));
    assert_eq!(
        network.comment(&ObjectRef::Node("ECU1".to_string())),
        Some("Engine controller")
    );
    assert_eq!(network.comment(&ObjectRef::Message(512)), None);

    // Explicit value
    assert_eq!(
        network.attribute("GenMsgCycleTime", &ObjectRef::Message(291)),
        Some(&AttributeLiteral::Int(10))
    );
    // Falls back to the default
    assert_eq!(
        network.attribute("GenMsgCycleTime", &ObjectRef::Message(512)),
        Some(&AttributeLiteral::Int(100))
    );
    assert_eq!(
        network
            .attribute("BusType", &ObjectRef::Network)
            .and_then(|v| v.as_str()),
        Some("CAN")
    );
    // Defaults only apply to objects of the definition's kind
    assert_eq!(network.attribute("GenMsgCycleTime", &ObjectRef::Network), None);
}

#[test]
fn test_reference_integrity() {
    let header = "VERSION \"\"\nNS_ :\nBS_:\nBU_: ECU1\n";

    let err = parse(&format!("{}CM_ SG_ 42 Missing \"x\";\n", header)).unwrap_err();
    assert!(matches!(
        err,
        DbcError::Semantic(SemanticError::UnresolvedReference {
            kind: EntityKind::Message,
            ..
        })
    ));

    let ok = format!(
        "{}BO_ 1 Msg: 8 Vector__XXX\n SG_ S : 0|8@1+ (1,0) [0|0] \"\" Vector__XXX\n",
        header
    );
    assert!(parse(&ok).is_ok());

    let unknown_receiver = format!(
        "{}BO_ 1 Msg: 8 ECU1\n SG_ S : 0|8@1+ (1,0) [0|0] \"\" Dashboard\n",
        header
    );
    assert!(parse(&unknown_receiver).is_err());
    let relaxed = ParseConfig::default().with_strict_node_references(false);
    assert!(parse_with_config(&unknown_receiver, &relaxed).is_ok());
}

#[test]
fn test_attribute_default_keyword_precedence() {
    let network = parse(
        "VERSION \"\"\nNS_ :\nBS_:\nBU_:\nBA_DEF_ \"X\" INT 0 10;\nBA_DEF_DEF_ \"X\" 0;\n",
    )
    .unwrap();
    let definition = network.attribute_definition("X").unwrap();
    assert_eq!(definition.default, Some(AttributeLiteral::Int(0)));
}

#[test]
fn test_error_positions() {
    let err = parse("VERSION \"\"\nNS_ :\nBS_:\nBU_: ECU1\nBO_ 1 Msg 8 ECU1\n").unwrap_err();
    match err {
        DbcError::Parse(parse_err) => {
            assert_eq!(parse_err.position.line, 5);
            assert_eq!(parse_err.expected, vec!["':'"]);
            assert!(parse_err.to_string().contains("5:11"));
        }
        other => panic!("expected parse error, got {:?}", other),
    }

    let err = parse("VERSION \"\"\nNS_ :\nBS_:\nBU_: ECU$\n").unwrap_err();
    match err {
        DbcError::Lex(lex_err) => {
            assert_eq!(lex_err.position.line, 4);
            assert_eq!(lex_err.position.column, 9);
            assert_eq!(lex_err.fragment, "$");
        }
        other => panic!("expected lex error, got {:?}", other),
    }
}

#[test]
fn test_parse_file() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(POWERTRAIN.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let network = parse_file(temp_file.path()).unwrap();
    assert_eq!(network, parse(POWERTRAIN).unwrap());
}

#[test]
fn test_parse_file_latin1_fallback() {
    let mut bytes = b"VERSION \"\"\nNS_ :\nBS_:\nBU_: ECU1\nCM_ BU_ ECU1 \"Temp in ".to_vec();
    bytes.push(0xB0); // degree sign in Latin-1, invalid as UTF-8
    bytes.extend_from_slice(b"C\";\n");

    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(&bytes).unwrap();
    temp_file.flush().unwrap();

    let network = parse_file(temp_file.path()).unwrap();
    assert_eq!(
        network.comment(&ObjectRef::Node("ECU1".to_string())),
        Some("Temp in \u{b0}C")
    );
}

#[test]
fn test_parse_missing_file() {
    let err = parse_file(std::path::Path::new("/nonexistent/network.dbc")).unwrap_err();
    assert!(matches!(err, DbcError::Io(_)));
}
