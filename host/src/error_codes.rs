//! firmware error catalog for the `error` field of error-log records.

use serde::Serialize;
use serde_json::Value;

pub const UNKNOWN_NAME: &str = "Unknown Error";
pub const UNKNOWN_DESCRIPTION: &str = "No description available";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorCode {
    pub code: u16,
    pub name: &'static str,
    pub description: &'static str,
}

/// sorted by code so lookups can binary search
static CATALOG: &[ErrorCode] = &[
    ErrorCode { code: 1, name: "ERR_SYSTEM_BOOT", description: "Device failed to initialize during power on boot" },
    ErrorCode { code: 2, name: "ERR_SYSTEM_PANIC", description: "Device restarted due to Panic error by the controller" },
    ErrorCode { code: 3, name: "ERR_SYSTEM_INTWDT", description: "Device restarted due to interrupt watchdog timer by the controller" },
    ErrorCode { code: 4, name: "ERR_SYSTEM_TASKWDT", description: "Device restarted due to task watchdog timer by the controller" },
    ErrorCode { code: 5, name: "ERR_SYSTEM_BROWNOUT", description: "Device restarted due to supply voltage below brownout threshold level" },
    ErrorCode { code: 6, name: "ERR_SYSTEM_CACHE", description: "Device restarted due to system cache failure" },
    ErrorCode { code: 7, name: "ERR_SYSTEM_MEMORYPROTECTION", description: "Device restarted due to memory protection failure" },
    ErrorCode { code: 8, name: "ERR_SYSTEM_STACK", description: "Device restarted due to stack failure" },
    ErrorCode { code: 9, name: "ERR_SYSTEM_HEAP", description: "Device restarted due to Heap memory failure" },
    ErrorCode { code: 10, name: "ERR_SYSTEM_UBSAN", description: "Device restarted due to Undefined behavior sanitizer (UBSAN) checks" },
    ErrorCode { code: 20, name: "ERR_HEATER1_FAILURE", description: "Heater1 circuit is in either short circuit or over temperature or current threshold limit" },
    ErrorCode { code: 21, name: "ERR_HEATER1_OPEN", description: "Heater1 is in open state" },
    ErrorCode { code: 22, name: "ERR_HEATER1_OUTOFRANGE", description: "Heater1 current is out of range" },
    ErrorCode { code: 23, name: "ERR_HEATER1_MIN_CURRENT", description: "Heater1 current is below minimum Threshold" },
    ErrorCode { code: 24, name: "ERR_HEATER2_FAILURE", description: "Heater2 circuit is in either short circuit or over temperature or current threshold limit" },
    ErrorCode { code: 25, name: "ERR_HEATER2_OPEN", description: "Heater2 is in open state" },
    ErrorCode { code: 26, name: "ERR_HEATER2_OUTOFRANGE", description: "Heater2 current is out of range" },
    ErrorCode { code: 27, name: "ERR_HEATER2_MIN_CURRENT", description: "Heater2 current is below minimum Threshold" },
    ErrorCode { code: 28, name: "ERR_HEATER3_FAILURE", description: "Heater3 circuit is in either short circuit or over temperature or current threshold limit" },
    ErrorCode { code: 29, name: "ERR_HEATER3_OPEN", description: "Heater3 is in open state" },
    ErrorCode { code: 30, name: "ERR_HEATER3_OUTOFRANGE", description: "Heater3 current is out of range" },
    ErrorCode { code: 31, name: "ERR_HEATER3_MIN_CURRENT", description: "Heater3 current is below minimum Threshold" },
    ErrorCode { code: 32, name: "ERR_HEATER4_FAILURE", description: "Heater4 circuit is in either short circuit or over temperature or current threshold limit" },
    ErrorCode { code: 33, name: "ERR_HEATER4_OPEN", description: "Heater4 is in open state" },
    ErrorCode { code: 34, name: "ERR_HEATER4_OUTOFRANGE", description: "Heater4 current is out of range" },
    ErrorCode { code: 35, name: "ERR_HEATER4_MIN_CURRENT", description: "Heater4 current is below minimum Threshold" },
    ErrorCode { code: 36, name: "ERR_HEATER_SENSOR_MISMATCH", description: "Heater and sensor mismatch" },
    ErrorCode { code: 40, name: "ERR_TSENSOR1_OPEN", description: "Zone 1 sensor is short to ground or in open state" },
    ErrorCode { code: 41, name: "ERR_TSENSOR1_FAILURE", description: "Zone 1 sensor is shorted to source" },
    ErrorCode { code: 42, name: "ERR_TSENSOR1_OUTOFRANGE", description: "Zone 1 sensor is out of range" },
    ErrorCode { code: 43, name: "ERR_TSENSOR2_OPEN", description: "Zone 2 sensor is short to ground or in open state" },
    ErrorCode { code: 44, name: "ERR_TSENSOR2_FAILURE", description: "Zone 2 sensor is shorted to source" },
    ErrorCode { code: 45, name: "ERR_TSENSOR2_OUTOFRANGE", description: "Zone 2 sensor is out of range" },
    ErrorCode { code: 46, name: "ERR_TSENSOR3_OPEN", description: "Zone 3 sensor is short to ground or in open state" },
    ErrorCode { code: 47, name: "ERR_TSENSOR3_FAILURE", description: "Zone 3 sensor is shorted to source" },
    ErrorCode { code: 48, name: "ERR_TSENSOR3_OUTOFRANGE", description: "Zone 3 sensor is out of range" },
    ErrorCode { code: 49, name: "ERR_TSENSOR4_OPEN", description: "Zone 4 sensor is short to ground or in open state" },
    ErrorCode { code: 50, name: "ERR_TSENSOR4_FAILURE", description: "Zone 4 sensor is shorted to source" },
    ErrorCode { code: 51, name: "ERR_TSENSOR4_OUTOFRANGE", description: "Zone 4 sensor is out of range" },
    ErrorCode { code: 52, name: "ERR_PIB_SENSOR_OPEN", description: "Zone PIB sensor is short to ground or in open state" },
    ErrorCode { code: 53, name: "ERR_PIB_SENSOR_FAILURE", description: "Zone PIB sensor is shorted to source" },
    ErrorCode { code: 54, name: "ERR_PIB_SENSOR_OUTOFRANGE", description: "Zone PIB sensor is out of range" },
    ErrorCode { code: 60, name: "ERR_TSENSOR5_OPEN", description: "Enclosure sensor is short to ground or in open state" },
    ErrorCode { code: 61, name: "ERR_TSENSOR5_FAILURE", description: "Enclosure sensor is shorted to source" },
    ErrorCode { code: 62, name: "ERR_TSENSOR5_OUTOFRANGE", description: "Enclosure sensor is out of range" },
    ErrorCode { code: 70, name: "ERR_BLE_INIT", description: "BLE stack Initialization failed" },
    ErrorCode { code: 71, name: "ERR_BLE_SERVICESINIT", description: "BLE service Initialization failed" },
    ErrorCode { code: 72, name: "ERR_BLE_CONNECT", description: "BLE connection failed" },
    ErrorCode { code: 73, name: "ERR_BLE_ADVT", description: "BLE Advertisement failed" },
    ErrorCode { code: 74, name: "ERR_BLE_PROTOCOL", description: "Receive wrong/unexpected BLE frame format" },
    ErrorCode { code: 80, name: "ERR_SMGR_INIT", description: "Storage manager (NVS) initialization failed" },
    ErrorCode { code: 81, name: "ERR_SMGR_PIB_INDEX_RD", description: "Reading Person-In-Bed Index from NVS memory failed" },
    ErrorCode { code: 82, name: "ERR_SMGR_PIB_INDEX_WR", description: "Writing Person-In-Bed Index to NVS memory failed" },
    ErrorCode { code: 83, name: "ERR_SMGR_PIB_SET", description: "Person-In-Bed Set write commit failed" },
    ErrorCode { code: 84, name: "ERR_SMGR_PIB_GET", description: "Person-In-Bed Get Read failed" },
    ErrorCode { code: 85, name: "ERR_SMGR_MD_INDEX_RD", description: "Reading Machine data Index from NVS memory failed" },
    ErrorCode { code: 86, name: "ERR_SMGR_MD_INDEX_WR", description: "Writing Machine data to NVS memory failed" },
    ErrorCode { code: 87, name: "ERR_SMGR_MD_SET", description: "Machine data Set write commit failed" },
    ErrorCode { code: 88, name: "ERR_SMGR_MD_GET", description: "Machine data Get Read failed" },
    ErrorCode { code: 89, name: "ERR_SMGR_ERH_INDEX_RD", description: "Reading Error History Index from NVS memory failed" },
    ErrorCode { code: 90, name: "ERR_SMGR_ERH_INDEX_WR", description: "Writing Error History to NVS memory failed" },
    ErrorCode { code: 91, name: "ERR_SMGR_ERH_SET", description: "Error History Set write commit failed" },
    ErrorCode { code: 92, name: "ERR_SMGR_ERH_GET", description: "Error History Get Read failed" },
    ErrorCode { code: 100, name: "ERR_CONFIG_READ", description: "Failure in reading Pib configuration parameters from NVS and updating them to Runtime variables" },
    ErrorCode { code: 101, name: "ERR_CONFIG_WRITE", description: "Failure in updating Zone modifiers and Failure in updating Pib configuration parameters to NVS" },
    ErrorCode { code: 120, name: "ERR_BME_INIT", description: "BME initialization failure due to library or due to I2C communication failure" },
    ErrorCode { code: 121, name: "ERR_BME_BSEC_INIT", description: "BME initialization failure due to library or I2C communication failure" },
    ErrorCode { code: 124, name: "ERR_BME_RESET", description: "Device Not able to Reset the BME sensor" },
    ErrorCode { code: 126, name: "ERR_BME_HUMIDITY", description: "BME Humidity sensor value is out of range" },
    ErrorCode { code: 130, name: "ERR_BME_TASK", description: "Failed to start BME task" },
    ErrorCode { code: 140, name: "ERR_CMDH_DEVICESTATUS", description: "Failure in appending device status data to BLE buffer" },
    ErrorCode { code: 147, name: "ERR_CMDH_MACHINEDATA", description: "Failure in appending machine data to BLE buffer" },
    ErrorCode { code: 150, name: "ERR_CMU_DEVICEINFO", description: "Failure in reading device information using BLE" },
    ErrorCode { code: 160, name: "ERR_STM_TASKCREATE", description: "State machine task creation failed" },
    ErrorCode { code: 170, name: "ERR_TIMER1_INIT", description: "Error if Zone scan timer failed to initialize" },
    ErrorCode { code: 171, name: "ERR_TIMER1_START", description: "Error if Zone scan timer failed to start" },
    ErrorCode { code: 172, name: "ERR_TIMER1_STOP", description: "Error if Zone scan timer failed to stop" },
    ErrorCode { code: 173, name: "ERR_TIMER1_DELETE", description: "Error if Zone scan timer failed to delete" },
    ErrorCode { code: 174, name: "ERR_TIMER2_INIT", description: "Error if LED timer failed to initialize" },
    ErrorCode { code: 175, name: "ERR_TIMER2_START", description: "Error if LED timer failed to start" },
    ErrorCode { code: 176, name: "ERR_TIMER2_STOP", description: "Error if LED timer failed to stop" },
    ErrorCode { code: 177, name: "ERR_TIMER2_DELETE", description: "Error if LED timer failed to delete" },
    ErrorCode { code: 178, name: "ERR_TIMER3_INIT", description: "Error if SW timer for WDT failed to initialize" },
    ErrorCode { code: 179, name: "ERR_TIMER3_START", description: "Error if SW timer for WDT failed to start" },
    ErrorCode { code: 180, name: "ERR_TIMER3_STOP", description: "Error if SW timer for WDT failed to stop" },
    ErrorCode { code: 181, name: "ERR_TIMER3_DELETE", description: "Error if SW timer for WDT failed to delete" },
    ErrorCode { code: 182, name: "ERR_GPIO_INIT", description: "Error if GPIO Initialization failed" },
    ErrorCode { code: 183, name: "ERR_GPIO_SETOUTPUTLEVEL", description: "Error if Setting output level for GPIO failed" },
    ErrorCode { code: 184, name: "ERR_WDT_INIT", description: "Error if WDT initialization failed" },
    ErrorCode { code: 185, name: "ERR_WDT_WDIRESET", description: "Error if WDT - Input signal reset failed" },
    ErrorCode { code: 190, name: "ERR_I2C0_INIT", description: "I2C0 Initialization failure" },
    ErrorCode { code: 191, name: "ERR_I2C1_INIT", description: "I2C1 Initialization failure" },
    ErrorCode { code: 192, name: "ERR_I2C_PARAMETER", description: "I2C Invalid parameter return" },
    ErrorCode { code: 193, name: "ERR_I2C_START", description: "I2C driver start failure" },
    ErrorCode { code: 194, name: "ERR_I2C_STOP", description: "I2C driver stop failure" },
    ErrorCode { code: 195, name: "ERR_I2C_READ", description: "I2C driver read failure" },
    ErrorCode { code: 196, name: "ERR_I2C_WRITE", description: "I2C driver write failure" },
    ErrorCode { code: 197, name: "ERR_ADC_CALIBRATION", description: "ADC Calibration failure" },
    ErrorCode { code: 198, name: "ERR_ADC_CONFIGURATION", description: "ADC Configuration failure" },
    ErrorCode { code: 199, name: "ERR_ADC_READ", description: "ADC read failure" },
    ErrorCode { code: 200, name: "ERR_ADC_PARAMETER", description: "ADC Invalid parameter return" },
    ErrorCode { code: 201, name: "ERR_ADC_GETRAWDATA", description: "ADC getting raw data failure" },
    ErrorCode { code: 202, name: "ERR_ADC_CHANNEL", description: "ADC Channel failure" },
    ErrorCode { code: 203, name: "ERR_ADC_BUSVOLTAGE", description: "Set if Bus voltage goes low below the threshold voltage" },
    ErrorCode { code: 204, name: "ERR_HISW_INIT", description: "High side switch Initialization failure" },
    ErrorCode { code: 205, name: "ERR_UART_DISABLE", description: "Disabling UART ROM download mode and UART driver delete for FCT failure" },
    ErrorCode { code: 210, name: "ERR_RTC_INIT", description: "External RTC initialization failure" },
    ErrorCode { code: 211, name: "ERR_RTC_CONFIG", description: "RTC configuration Error" },
    ErrorCode { code: 212, name: "ERR_RTC_READ", description: "RTC reading Error" },
    ErrorCode { code: 213, name: "ERR_RTC_WRITE", description: "RTC writing error" },
    ErrorCode { code: 214, name: "ERR_RTC_BAT_LOW", description: "Set if Battery voltage goes low below the threshold voltage" },
    ErrorCode { code: 220, name: "ERR_MQTT_CONN", description: "Set if MQTT connection to client failed" },
    ErrorCode { code: 221, name: "ERR_MQTT_CONN_INTPED", description: "Set if MQTT connection is interrupted" },
    ErrorCode { code: 222, name: "ERR_MQTT_PUB", description: "Set if publish failed" },
    ErrorCode { code: 223, name: "ERR_HTTP_CONN", description: "Set if HTTP connection failed" },
    ErrorCode { code: 224, name: "ERR_HTTP_DISCONN", description: "Set if HTTP connection was interrupted" },
    ErrorCode { code: 225, name: "ERR_HTTP_Post", description: "Set if HTTP set post field failed" },
    ErrorCode { code: 226, name: "ERR_OTA_INIT", description: "Set if OTA initialization failed" },
    ErrorCode { code: 227, name: "ERR_HTTP_READ_AND_OTA_WRITE", description: "Set if HTTP read failed" },
    ErrorCode { code: 228, name: "ERR_HTTP_READ_COMPLETE", description: "Set if complete data is not received" },
    ErrorCode { code: 229, name: "ERR_OTA_COMPLETE", description: "Set if OTA is not completed" },
    ErrorCode { code: 230, name: "ERR_MD5_HASH", description: "Set if MD5 mismatch detected" },
    ErrorCode { code: 231, name: "ERR_WIFI_FOTA_IN_PROGRESS", description: "Set if WiFi FOTA is in progress and BLE FOTA is triggered" },
    ErrorCode { code: 232, name: "ERR_BLE_FOTA_IN_PROGRESS", description: "Set if BLE FOTA is in progress and WiFi FOTA is triggered" },
    ErrorCode { code: 233, name: "ERR_HTTPS_POST_MD_DATA", description: "Set if Machine data transmission through WiFi failed" },
    ErrorCode { code: 234, name: "ERR_WIFI_TASKCREATE", description: "WiFi Task creation failed" },
];

pub fn lookup(code: u16) -> Option<&'static ErrorCode> {
    CATALOG
        .binary_search_by_key(&code, |e| e.code)
        .ok()
        .map(|idx| &CATALOG[idx])
}

/// `(name, description)` for a raw JSON `error` value, falling back to the
/// unknown pair for missing, non-numeric or uncatalogued codes
pub fn describe(value: &Value) -> (&'static str, &'static str) {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .and_then(|c| u16::try_from(c).ok())
        .and_then(lookup)
        .map(|e| (e.name, e.description))
        .unwrap_or((UNKNOWN_NAME, UNKNOWN_DESCRIPTION))
}
